//! # Pool: the submission front door and worker owner.
//!
//! [`Pool`] owns the workers, the load heap, the slot budget and the idle
//! queues. Submissions go through [`Pool::add_task`], which routes each
//! descriptor to a hot idle worker when one exists, to the least-loaded
//! worker otherwise, and waits on the aggregate slot budget when every queue
//! is full.
//!
//! Slot accounting is strictly conservative: every accepted submission holds
//! exactly one heap reservation and one slot permit, and every completed
//! execution returns exactly one permit. The idle-worker queue carries
//! *hints* only; a hint is validated against the heap before use.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use tokio::{
    sync::{mpsc, Semaphore, TryAcquireError},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bus::Bus,
    config::PoolConfig,
    error::PoolError,
    event::{Event, EventKind},
    group::TaskGroup,
    heap::LoadHeap,
    idle::IdleQueue,
    observer::Observer,
    options::TaskOptions,
    worker::Worker,
};

/// State shared between the pool, its workers and retry handles.
pub(crate) struct Shared {
    /// Per-worker queue capacity.
    pub(crate) queue_len: usize,
    /// Min-heap of live workers keyed by load.
    pub(crate) heap: LoadHeap,
    /// Hints naming workers whose queue was empty when published.
    pub(crate) idle_worker: IdleQueue,
    /// Aggregate slot budget: one permit per free queue slot in the pool.
    pub(crate) idle_slot: Arc<Semaphore>,
    /// Ids of retired workers, available to be started again.
    pub(crate) work_run: IdleQueue,
    /// Retire requests; the first idle-capable worker wins one.
    pub(crate) quit: Semaphore,
    /// One token per live worker.
    pub(crate) status: Box<[Semaphore]>,
    /// Tasks executed, per worker.
    pub(crate) num_count: Box<[AtomicU64]>,
    /// Cumulative execution wall time in microseconds, per worker.
    pub(crate) time_count: Box<[AtomicU64]>,
    /// Terminal flag; completion bookkeeping stops once set.
    pub(crate) closed: AtomicBool,
    /// Lifecycle event bus.
    pub(crate) bus: Bus,
}

/// Bounded worker pool with load-balanced dispatch.
///
/// # Example
/// ```no_run
/// use taskpool::{Pool, TaskError, TaskOptions};
///
/// # async fn demo() -> Result<(), taskpool::PoolError> {
/// let pool = Pool::new(4, 16);
/// let group = pool.new_task_group(1);
///
/// pool.add_task(
///     TaskOptions::new()
///         .task(|| async { Ok::<_, TaskError>(()) })
///         .auto_done()
///         .group(&group),
/// )
/// .await?;
///
/// group.wait().await;
/// pool.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Pool {
    cfg: PoolConfig,
    shared: Arc<Shared>,
    senders: Vec<mpsc::Sender<TaskOptions>>,
    cancel: CancellationToken,
    groups: Mutex<Vec<TaskGroup>>,
    close_started: AtomicBool,
}

impl Pool {
    /// Creates a pool with `workers` executors and `queue_len` slots each.
    ///
    /// Must be called within a Tokio runtime; the workers are spawned as
    /// detached tasks.
    ///
    /// # Panics
    /// Panics if `workers` or `queue_len` is zero. Use
    /// [`Pool::with_config`] for a fallible constructor.
    pub fn new(workers: usize, queue_len: usize) -> Self {
        let cfg = PoolConfig {
            workers,
            queue_len,
            ..PoolConfig::default()
        };
        match Self::with_config(cfg) {
            Ok(pool) => pool,
            Err(e) => panic!("{e}"),
        }
    }

    /// Creates a pool from a validated [`PoolConfig`].
    pub fn with_config(cfg: PoolConfig) -> Result<Self, PoolError> {
        cfg.validate()?;
        let workers = cfg.workers;
        let queue_len = cfg.queue_len;

        let shared = Arc::new(Shared {
            queue_len,
            heap: LoadHeap::new(workers, queue_len),
            idle_worker: IdleQueue::new(),
            idle_slot: Arc::new(Semaphore::new(0)),
            work_run: IdleQueue::new(),
            quit: Semaphore::new(0),
            status: (0..workers).map(|_| Semaphore::new(0)).collect(),
            num_count: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            time_count: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            closed: AtomicBool::new(false),
            bus: Bus::new(cfg.bus_capacity),
        });

        let cancel = CancellationToken::new();
        let mut senders = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::channel(queue_len + 1);
            senders.push(tx);

            // Synchronous part of the startup sequence, so a submission
            // issued right after construction already sees the worker.
            shared.status[id].add_permits(1);
            shared.heap.push(id, 0);
            shared.idle_worker.put(id);

            let worker = Worker {
                id,
                shared: shared.clone(),
                rx,
            };
            tokio::spawn(worker.run(cancel.child_token()));
        }

        Ok(Self {
            cfg,
            shared,
            senders,
            cancel,
            groups: Mutex::new(Vec::new()),
            close_started: AtomicBool::new(false),
        })
    }

    fn groups(&self) -> MutexGuard<'_, Vec<TaskGroup>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks a worker and reserves one unit of its load.
    ///
    /// Prefers a hot (empty-queue) worker from the hints, discarding stale
    /// entries; falls back to the least-loaded worker below capacity.
    fn pick_worker(&self) -> Option<usize> {
        let shared = &self.shared;
        while let Some(id) = shared.idle_worker.try_take() {
            if shared.heap.reserve(id) {
                return Some(id);
            }
        }
        shared.heap.pop()
    }

    /// Submits a descriptor to the pool.
    ///
    /// Routing: hot idle worker if available, else the least-loaded worker
    /// whose queue is not full, else wait on the aggregate slot budget:
    /// indefinitely when the descriptor's `wait_timeout` is zero, with a
    /// timer otherwise. On a timer expiry the descriptor's `on_timeout`
    /// fires, auto-done decrements the group, and [`PoolError::Timeout`] is
    /// returned.
    pub async fn add_task(&self, mut opt: TaskOptions) -> Result<(), PoolError> {
        if opt.job.is_none() {
            return Err(PoolError::MissingTask);
        }
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let deadline = (!opt.wait_timeout.is_zero()).then(|| Instant::now() + opt.wait_timeout);

        let target = loop {
            // A reservation must be paired with one slot permit, or undone.
            if let Some(id) = self.pick_worker() {
                match shared.idle_slot.try_acquire() {
                    Ok(permit) => {
                        permit.forget();
                        break id;
                    }
                    Err(TryAcquireError::NoPermits) => shared.heap.decrement(id),
                    Err(TryAcquireError::Closed) => {
                        shared.heap.decrement(id);
                        return Err(PoolError::Closed);
                    }
                }
            }

            // Saturated: wait for the budget to free up.
            let permit = match deadline {
                None => shared
                    .idle_slot
                    .acquire()
                    .await
                    .map_err(|_| PoolError::Closed)?,
                Some(at) => match time::timeout_at(at, shared.idle_slot.acquire()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return Err(PoolError::Closed),
                    Err(_) => {
                        if let Some(f) = opt.on_timeout.take() {
                            f();
                        }
                        if opt.auto_done {
                            if let Some(g) = &opt.group {
                                g.done();
                            }
                        }
                        shared.bus.publish(
                            Event::now(EventKind::SubmitTimedOut).with_waited(opt.wait_timeout),
                        );
                        return Err(PoolError::Timeout {
                            waited: opt.wait_timeout,
                        });
                    }
                },
            };

            // A held permit guarantees some worker is below capacity, so
            // selection normally succeeds; losing the race to a concurrent
            // retirement just means waiting again.
            if let Some(id) = self.pick_worker() {
                permit.forget();
                break id;
            }
            drop(permit);
            if shared.closed.load(Ordering::SeqCst) {
                return Err(PoolError::Closed);
            }
            tokio::task::yield_now().await;
        };

        if self.senders[target].send(opt).await.is_err() {
            // Worker is gone; undo the reservation and give the slot back.
            shared.heap.decrement(target);
            shared.idle_slot.add_permits(1);
            return Err(PoolError::Closed);
        }
        Ok(())
    }

    /// Creates a task group counting `tasks` and registers it so that
    /// [`Pool::close`] awaits it.
    pub fn new_task_group(&self, tasks: usize) -> TaskGroup {
        let group = TaskGroup::new(tasks);
        self.groups().push(group.clone());
        group
    }

    /// Snapshot of per-worker load, execution count and busy time.
    pub fn usage(&self) -> Usage {
        let shared = &self.shared;
        Usage {
            workers: (0..self.cfg.workers)
                .map(|id| WorkerUsage {
                    worker: id,
                    load: shared.heap.load(id),
                    executed: shared.num_count[id].load(Ordering::SeqCst),
                    busy: Duration::from_micros(shared.time_count[id].load(Ordering::SeqCst)),
                })
                .collect(),
        }
    }

    /// Spawns a listener that forwards every pool event to `observer`.
    pub fn attach_observer<O>(&self, observer: O)
    where
        O: Observer + Send + Sync + 'static,
    {
        let mut rx = self.shared.bus.subscribe();
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                observer.on_event(&ev).await;
            }
        });
    }

    /// Subscribes to the pool's lifecycle events.
    #[cfg(feature = "events")]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Shuts the pool down.
    ///
    /// Awaits every registered task group in registration order, then marks
    /// the pool closed, cancels the workers and tears the channels down.
    /// In-flight tasks run to completion and their callbacks still fire, but
    /// their completion bookkeeping is skipped. Descriptors still queued are
    /// dropped with the worker receivers.
    ///
    /// Idempotent; repeated calls return immediately.
    pub async fn close(&self) {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let groups: Vec<TaskGroup> = self.groups().clone();
        for group in groups {
            group.wait().await;
        }

        let shared = &self.shared;
        shared.bus.publish(Event::now(EventKind::ShutdownRequested));
        shared.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        // Wake blocked submitters and retry handles, then drain what is
        // left of the coordination state.
        shared.idle_slot.close();
        shared.quit.close();
        shared.idle_worker.close();
        shared.idle_worker.drain();
        shared.work_run.close();
        shared.work_run.drain();
        for status in shared.status.iter() {
            if let Ok(permit) = status.try_acquire() {
                permit.forget();
            }
        }
        shared.heap.close();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // A pool dropped without close: unblock and retire the detached
        // workers so nothing waits forever on a dead pool.
        if !self.close_started.load(Ordering::SeqCst) {
            self.shared.closed.store(true, Ordering::SeqCst);
            self.cancel.cancel();
            self.shared.idle_slot.close();
            self.shared.quit.close();
            self.shared.idle_worker.close();
            self.shared.work_run.close();
        }
    }
}

/// Per-worker usage snapshot.
#[derive(Debug, Clone)]
pub struct WorkerUsage {
    /// Worker index.
    pub worker: usize,
    /// Tasks currently enqueued or executing.
    pub load: usize,
    /// Tasks executed so far.
    pub executed: u64,
    /// Cumulative execution wall time.
    pub busy: Duration,
}

/// Pool-wide usage report, one entry per worker.
#[derive(Debug, Clone)]
pub struct Usage {
    pub workers: Vec<WorkerUsage>,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in &self.workers {
            writeln!(
                f,
                "worker {}: load={} executed={} busy={}ms",
                w.worker,
                w.load,
                w.executed,
                w.busy.as_millis()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::TaskError;

    fn ok_task() -> TaskOptions {
        TaskOptions::new().task(|| async { Ok::<_, TaskError>(()) })
    }

    #[tokio::test]
    async fn with_config_rejects_zero_sizes() {
        let cfg = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            Pool::with_config(cfg),
            Err(PoolError::Config { .. })
        ));

        let cfg = PoolConfig {
            queue_len: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            Pool::with_config(cfg),
            Err(PoolError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn add_task_without_job_fails() {
        let pool = Pool::new(1, 1);
        let err = pool.add_task(TaskOptions::new()).await.unwrap_err();
        assert!(matches!(err, PoolError::MissingTask));
        pool.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_submissions() {
        let pool = Pool::new(1, 1);
        pool.close().await;
        pool.close().await;

        let err = pool.add_task(ok_task()).await.unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    async fn usage_reports_counts_and_settled_load() {
        let pool = Pool::new(2, 2);
        let group = pool.new_task_group(3);
        for _ in 0..3 {
            pool.add_task(ok_task().auto_done().group(&group))
                .await
                .expect("submit");
        }
        group.wait().await;
        // Bookkeeping runs just after the group decrement; give it a beat.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let usage = pool.usage();
        assert_eq!(usage.workers.len(), 2);
        assert_eq!(usage.workers.iter().map(|w| w.executed).sum::<u64>(), 3);
        assert_eq!(usage.workers.iter().map(|w| w.load).sum::<usize>(), 0);
        assert!(usage.to_string().contains("worker 0"));

        pool.close().await;
    }

    #[tokio::test]
    async fn quit_retires_an_idle_worker() {
        let pool = Pool::new(2, 2);
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.shared.quit.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(pool.shared.work_run.len(), 1);
        // The retired worker withdrew its queue_len share of the budget.
        assert_eq!(pool.shared.idle_slot.available_permits(), 2);

        // The remaining worker still serves submissions.
        let group = pool.new_task_group(1);
        pool.add_task(ok_task().auto_done().group(&group))
            .await
            .expect("submit after retirement");
        group.wait().await;

        pool.close().await;
    }
}
