use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ShutdownRequested,
    SubmitTimedOut,
    WorkerStarted,
    WorkerRetired,
    TaskStarting,
    TaskStopped,
    TaskFailed,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub waited: Option<Duration>,
    pub error: Option<String>,
    pub worker: Option<usize>,
    pub kind: EventKind,
    pub at: SystemTime,
}

impl Event {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            waited: None,
            error: None,
            worker: None,
        }
    }

    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    pub fn with_waited(mut self, d: Duration) -> Self {
        self.waited = Some(d);
        self
    }
}
