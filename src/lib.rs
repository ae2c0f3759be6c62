//! # taskpool
//!
//! **Taskpool** is a bounded worker pool with load-balanced task dispatch.
//!
//! A fixed set of long-lived workers drains per-worker bounded queues.
//! Each submission goes to a hot idle worker when one exists, otherwise to
//! the least-loaded worker whose queue is not full; when every queue is full
//! the submitter waits on the pool's aggregate slot budget, optionally with a
//! timeout. Workers isolate panics, sequence the descriptor's callbacks, and
//! keep the load heap and idle bookkeeping current.
//!
//! ## Features
//!
//! | Area               | Description                                                   | Key types / traits                  |
//! |--------------------|---------------------------------------------------------------|-------------------------------------|
//! | **Dispatch**       | Least-loaded routing with back-pressure and submit timeouts.  | [`Pool`], [`PoolConfig`]            |
//! | **Descriptors**    | Work closure plus success/error/complete/timeout callbacks.   | [`TaskOptions`]                     |
//! | **Jobs**           | Define work as closures or trait objects.                     | [`Job`], [`JobFn`], [`JobRef`]      |
//! | **Batching**       | Counting latch to await a batch of submissions.               | [`TaskGroup`]                       |
//! | **Retries**        | Slot-reserving cooperative retries from the error callback.   | [`RetryHandle`]                     |
//! | **Errors**         | Typed submission and execution errors.                        | [`PoolError`], [`TaskError`]        |
//! | **Observability**  | Hook into pool lifecycle events.                              | [`Observer`]                        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LoggerObserver`] _(demo/reference only)_.
//! - `events`: exports [`Event`] and [`EventKind`] plus [`Pool::subscribe`] for advanced integrations.
//!
//! ```no_run
//! use taskpool::{Pool, TaskError, TaskOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Pool::new(4, 16);
//!     let group = pool.new_task_group(1);
//!
//!     pool.add_task(
//!         TaskOptions::new()
//!             .task(|| async {
//!                 println!("hello from the pool");
//!                 Ok::<_, TaskError>(())
//!             })
//!             .auto_done()
//!             .group(&group),
//!     )
//!     .await?;
//!
//!     group.wait().await;
//!     pool.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod bus;
mod config;
mod error;
mod event;
mod group;
mod heap;
mod idle;
mod job;
mod observer;
mod options;
mod pool;
mod retry;
mod worker;

// ---- Public re-exports ----

pub use config::PoolConfig;
pub use error::{PoolError, TaskError};
pub use group::TaskGroup;
pub use job::{Job, JobFn, JobRef};
pub use observer::Observer;
pub use options::{AfterHook, Callback, ErrorCallback, TaskOptions};
pub use pool::{Pool, Usage, WorkerUsage};
pub use retry::RetryHandle;

// Optional: expose event types.
// Enable with: `--features events`
#[cfg(feature = "events")]
pub use crate::event::{Event, EventKind};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observer::LoggerObserver;
