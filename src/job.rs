//! # Job abstraction and function-backed job implementation.
//!
//! This module defines the [`Job`] trait (async, fallible) and a convenient
//! function-backed implementation [`JobFn`]. The common handle type is
//! [`JobRef`], an `Arc<dyn Job>` suitable for sharing across the pool.
//!
//! A job is the unit of work carried by a [`TaskOptions`](crate::TaskOptions)
//! descriptor. It takes no arguments and reports success or a
//! [`TaskError`]; cancellation is a worker-level concern, so an in-flight job
//! always runs to completion.

use std::{future::Future, sync::Mutex};

use async_trait::async_trait;

use crate::error::TaskError;

/// # Shared handle to a job object.
///
/// This is the primary type carried by descriptors and retry handles.
pub type JobRef = std::sync::Arc<dyn Job>;

/// # Asynchronous, fallible unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskpool::{Job, TaskError};
///
/// struct Demo;
///
/// #[async_trait]
/// impl Job for Demo {
///     async fn exec(&self) -> Result<(), TaskError> {
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Executes the job once, returning its outcome.
    async fn exec(&self) -> Result<(), TaskError>;
}

/// # Function-backed job implementation.
///
/// [`JobFn`] wraps a closure `Fnc: FnMut() -> Fut`. The closure is protected
/// by a [`Mutex`] to allow calling `exec(&self)` multiple times even though
/// the closure is `FnMut` (a retry handle re-runs the same job).
/// Use [`JobFn::arc`] for a one-liner that returns a [`JobRef`].
///
/// ### Concurrency semantics:
/// The mutex is held ONLY during the creation of the future (calling the
/// closure), not during its execution. If your closure captures mutable state
/// that is accessed INSIDE the returned future, add your own synchronization;
/// the `JobFn` mutex protects the future's creation only.
#[derive(Debug)]
pub struct JobFn<Fnc, Fut>
where
    Fnc: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    /// Underlying function (guarded by a mutex to allow `FnMut` with `&self`).
    func: Mutex<Fnc>,
}

impl<Fnc, Fut> JobFn<Fnc, Fut>
where
    Fnc: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    /// Creates a new function-backed job.
    ///
    /// Prefer [`JobFn::arc`] when you immediately need a [`JobRef`].
    pub fn new(func: Fnc) -> Self {
        Self {
            func: Mutex::new(func),
        }
    }

    /// Creates the job and returns it as a shared handle (`Arc<dyn Job>`).
    ///
    /// # Example
    /// ```
    /// use taskpool::{JobFn, JobRef, TaskError};
    ///
    /// let j: JobRef = JobFn::arc(|| async { Ok::<_, TaskError>(()) });
    /// ```
    pub fn arc(func: Fnc) -> JobRef {
        std::sync::Arc::new(Self::new(func))
    }
}

#[async_trait]
impl<Fnc, Fut> Job for JobFn<Fnc, Fut>
where
    Fnc: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn exec(&self) -> Result<(), TaskError> {
        let fut = {
            let mut f = self
                .func
                .lock()
                .map_err(|_| TaskError::fail("job mutex poisoned"))?;
            (f)()
        };
        fut.await
    }
}
