//! # Observer hook for pool lifecycle events.
//!
//! Attach an [`Observer`] with
//! [`Pool::attach_observer`](crate::Pool::attach_observer) to receive every
//! [`Event`] the pool publishes (logging, metrics, custom integrations).

use async_trait::async_trait;

use crate::event::Event;

/// Receives every event published on the pool's bus.
#[async_trait]
pub trait Observer {
    async fn on_event(&self, event: &Event);
}

/// Base observer that logs events to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
#[cfg(feature = "logging")]
pub struct LoggerObserver;

#[cfg(feature = "logging")]
#[async_trait]
impl Observer for LoggerObserver {
    async fn on_event(&self, e: &Event) {
        use crate::event::EventKind;

        match e.kind {
            EventKind::WorkerStarted => {
                println!("[worker-started] worker={:?}", e.worker);
            }
            EventKind::WorkerRetired => {
                println!("[worker-retired] worker={:?}", e.worker);
            }
            EventKind::TaskStarting => {
                if let Some(w) = e.worker {
                    println!("[starting] worker={w}");
                }
            }
            EventKind::TaskStopped => {
                println!("[stopped] worker={:?}", e.worker);
            }
            EventKind::TaskFailed => {
                println!("[failed] worker={:?} err={:?}", e.worker, e.error);
            }
            EventKind::SubmitTimedOut => {
                println!("[submit-timeout] waited={:?}", e.waited);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
        }
    }
}
