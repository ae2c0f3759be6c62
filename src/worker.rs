//! # Long-lived worker executor.
//!
//! A [`Worker`] owns one task channel and drains it in an event loop that
//! also listens for the pool's quit signal and the shared cancellation token.
//! Tasks run under panic isolation; callbacks are sequenced per the
//! descriptor contract; load and idle bookkeeping happens after every
//! execution while the pool is open.
//!
//! # High-level architecture:
//!
//! ```text
//!   submitters ──► task[w] ──► Worker ──► job + callbacks
//!                              │  ▲
//!                    quit ─────┘  └───── cancellation
//!                    (idle only)         (immediate)
//! ```

use std::{any::Any, sync::atomic::Ordering, sync::Arc, time::Instant};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    event::{Event, EventKind},
    group::TaskGroup,
    job::JobRef,
    options::{Callback, ErrorCallback, TaskOptions},
    pool::Shared,
    retry::RetryHandle,
};

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) shared: Arc<Shared>,
    pub(crate) rx: mpsc::Receiver<TaskOptions>,
}

impl Worker {
    /// Runs the worker until cancellation, an honored quit, or channel close.
    ///
    /// The pool has already pushed the status token, inserted the worker into
    /// the heap and published the idle hint; the worker contributes its
    /// `queue_len` slots to the aggregate budget here, then loops.
    pub(crate) async fn run(mut self, token: CancellationToken) {
        let shared = self.shared.clone();
        let id = self.id;

        shared.idle_slot.add_permits(shared.queue_len);
        shared
            .bus
            .publish(Event::now(EventKind::WorkerStarted).with_worker(id));

        loop {
            tokio::select! {
                // Pool is shutting down: exit without draining. In-flight
                // work has already completed by the time this arm can win.
                _ = token.cancelled() => return,

                // Retire request. Honored only when the queue is empty at
                // observation time; otherwise the worker keeps draining and
                // simply stays out of the heap.
                quit = shared.quit.acquire() => match quit {
                    Ok(permit) => {
                        permit.forget();
                        shared.heap.delete(id);
                        if self.rx.is_empty() {
                            break;
                        }
                    }
                    Err(_) => return,
                },

                opt = self.rx.recv() => match opt {
                    Some(opt) => self.execute(opt).await,
                    None => break,
                },
            }
        }

        if !shared.closed.load(Ordering::SeqCst) {
            self.retire().await;
        }
    }

    /// Executes one descriptor under panic isolation and sequences its
    /// callbacks, then updates the load and idle bookkeeping.
    async fn execute(&mut self, opt: TaskOptions) {
        let TaskOptions {
            job,
            on_success,
            on_error,
            on_complete,
            auto_done,
            group,
            ..
        } = opt;
        // add_task rejects descriptors without a job.
        let Some(job) = job else { return };

        let shared = self.shared.clone();
        let id = self.id;

        shared.num_count[id].fetch_add(1, Ordering::SeqCst);
        shared
            .bus
            .publish(Event::now(EventKind::TaskStarting).with_worker(id));

        let start = Instant::now();
        let outcome = std::panic::AssertUnwindSafe(job.exec()).catch_unwind().await;
        shared.time_count[id].fetch_add(start.elapsed().as_micros() as u64, Ordering::SeqCst);

        match outcome {
            Ok(Ok(())) => {
                shared
                    .bus
                    .publish(Event::now(EventKind::TaskStopped).with_worker(id));
                if let Some(f) = on_success {
                    f();
                }
                if auto_done {
                    if let Some(g) = &group {
                        g.done();
                    }
                }
                if let Some(f) = on_complete {
                    f();
                }
            }
            Ok(Err(err)) => {
                self.failed(err, &job, on_complete, on_error, auto_done, group)
                    .await;
            }
            Err(payload) => {
                let err = TaskError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                };
                self.failed(err, &job, on_complete, on_error, auto_done, group)
                    .await;
            }
        }

        // Completion bookkeeping is skipped once the pool is closed: the
        // callbacks above still ran, but the slot budget and the heap are
        // being torn down.
        if !shared.closed.load(Ordering::SeqCst) {
            shared.heap.decrement(id);
            if self.rx.is_empty() {
                shared.idle_worker.put(id);
            }
            shared.idle_slot.add_permits(1);
        }
    }

    /// Failure tail shared by the returned-error and panic outcomes:
    /// `on_complete` first, then `on_error` with a retry handle.
    async fn failed(
        &self,
        err: TaskError,
        job: &JobRef,
        on_complete: Option<Callback>,
        on_error: Option<ErrorCallback>,
        auto_done: bool,
        group: Option<TaskGroup>,
    ) {
        self.shared.bus.publish(
            Event::now(EventKind::TaskFailed)
                .with_worker(self.id)
                .with_error(err.to_string()),
        );
        if let Some(f) = on_complete {
            f();
        }
        if let Some(f) = on_error {
            let handle = RetryHandle::new(
                self.shared.idle_slot.clone(),
                job.clone(),
                auto_done,
                group.clone(),
            );
            f(handle, group, err).await;
        }
    }

    /// Retirement sequence: reclaim the status token, withdraw this worker's
    /// share of the slot budget, consume one idle hint, and hand the id to
    /// the pool of startable workers.
    async fn retire(&mut self) {
        let shared = &self.shared;
        let id = self.id;

        if let Ok(permit) = shared.status[id].try_acquire() {
            permit.forget();
        }
        if let Ok(permits) = shared.idle_slot.acquire_many(shared.queue_len as u32).await {
            permits.forget();
        }
        let _ = shared.idle_worker.take().await;
        shared.work_run.put(id);
        shared
            .bus
            .publish(Event::now(EventKind::WorkerRetired).with_worker(id));
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
