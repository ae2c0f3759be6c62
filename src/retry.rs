//! # Cooperative retry handle delivered to `on_error`.
//!
//! [`RetryHandle::err_reload`] re-runs the failed job on the caller's own
//! context: it never re-enters the dispatch path (so it cannot deadlock the
//! pool), but it reserves one aggregate queue slot for its whole duration, so
//! retries stay accounted for in the pool's back-pressure budget.
//!
//! The handle is non-owning: it carries the pool's slot semaphore, the job,
//! the auto-done flag and the group, never the pool itself. Its lifetime must
//! not exceed the pool's `close` contract.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{error::TaskError, group::TaskGroup, job::JobRef, options::AfterHook};

/// Re-runs a failed task with bounded or unbounded retries.
pub struct RetryHandle {
    slots: Arc<Semaphore>,
    job: JobRef,
    auto_done: bool,
    group: Option<TaskGroup>,
}

impl RetryHandle {
    pub(crate) fn new(
        slots: Arc<Semaphore>,
        job: JobRef,
        auto_done: bool,
        group: Option<TaskGroup>,
    ) -> Self {
        Self {
            slots,
            job,
            auto_done,
            group,
        }
    }

    /// Runs the task again, up to `retries` times, stopping on first success.
    ///
    /// `retries < 1` retries indefinitely until the job succeeds. One slot is
    /// reserved from the pool's aggregate budget before the first attempt and
    /// released after the last; acquiring it may wait for a free slot.
    ///
    /// `after`, if set, is invoked with the final outcome: `None` on success,
    /// the last error otherwise. If the descriptor carried auto-done and the
    /// final outcome is success, the task group is decremented here.
    ///
    /// On a closed pool no attempt is made; `after` receives a synthesized
    /// error.
    pub async fn err_reload(self, retries: i32, after: Option<AfterHook>) {
        let permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                if let Some(f) = after {
                    f(Some(TaskError::fail("pool closed before retry")));
                }
                return;
            }
        };

        let mut last: Option<TaskError> = None;
        let mut attempt: i32 = 0;
        loop {
            attempt += 1;
            match self.job.exec().await {
                Ok(()) => {
                    last = None;
                    break;
                }
                Err(e) => {
                    last = Some(e);
                    if retries >= 1 && attempt >= retries {
                        break;
                    }
                }
            }
        }

        let succeeded = last.is_none();
        if let Some(f) = after {
            f(last);
        }
        if self.auto_done && succeeded {
            if let Some(g) = &self.group {
                g.done();
            }
        }
        drop(permit);
    }
}
