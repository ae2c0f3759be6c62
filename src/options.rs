//! # Task descriptor: the unit of submission.
//!
//! [`TaskOptions`] bundles the work closure with its callbacks, the
//! submission wait budget, the auto-done flag and the task-group
//! back-reference. Construction is builder-style: create an empty
//! descriptor, set the job, optionally set the rest. All setters are
//! idempotent replacements; the descriptor is frozen in practice once it is
//! handed to [`Pool::add_task`](crate::Pool::add_task).
//!
//! Callback contract (order enforced by the worker):
//! 1. The job runs first.
//! 2. On panic: `on_complete`, then `on_error` with a "task panicked" error.
//!    Auto-done does not fire.
//! 3. On returned error: `on_complete`, then `on_error` with that error.
//!    Auto-done does not fire.
//! 4. On success: `on_success`, then auto-done (if set), then `on_complete`.

use std::{future::Future, time::Duration};

use futures::future::BoxFuture;

use crate::{
    error::TaskError,
    group::TaskGroup,
    job::{JobFn, JobRef},
    retry::RetryHandle,
};

/// No-argument notification callback (`on_success`/`on_complete`/`on_timeout`).
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Error callback. Receives a retry handle, the owning task group and the
/// execution error; the worker awaits the returned future, so the handle's
/// [`err_reload`](RetryHandle::err_reload) can be driven from inside it.
pub type ErrorCallback =
    Box<dyn FnOnce(RetryHandle, Option<TaskGroup>, TaskError) -> BoxFuture<'static, ()> + Send>;

/// Hook invoked by [`err_reload`](RetryHandle::err_reload) with the final
/// outcome: `None` on success, the last error otherwise.
pub type AfterHook = Box<dyn FnOnce(Option<TaskError>) + Send + 'static>;

/// Options and callbacks for one submission.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskpool::{TaskError, TaskOptions};
///
/// let opt = TaskOptions::new()
///     .task(|| async { Ok::<_, TaskError>(()) })
///     .on_success(|| println!("done"))
///     .wait_timeout(Duration::from_millis(50));
/// ```
#[derive(Default)]
pub struct TaskOptions {
    pub(crate) job: Option<JobRef>,
    pub(crate) on_success: Option<Callback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_complete: Option<Callback>,
    pub(crate) on_timeout: Option<Callback>,
    pub(crate) wait_timeout: Duration,
    pub(crate) auto_done: bool,
    pub(crate) group: Option<TaskGroup>,
}

impl TaskOptions {
    /// Creates an empty descriptor. A job must be set before submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the work closure.
    pub fn task<Fnc, Fut>(mut self, f: Fnc) -> Self
    where
        Fnc: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.job = Some(JobFn::arc(f));
        self
    }

    /// Sets the work as a shared [`Job`](crate::Job) handle.
    pub fn job(mut self, job: JobRef) -> Self {
        self.job = Some(job);
        self
    }

    /// Callback fired after a clean success, before auto-done and
    /// `on_complete`.
    pub fn on_success(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Callback fired on a returned error or a contained panic, after
    /// `on_complete`. Receives a [`RetryHandle`], the owning group and the
    /// error; the worker awaits the returned future.
    pub fn on_error<Fnc, Fut>(mut self, f: Fnc) -> Self
    where
        Fnc: FnOnce(RetryHandle, Option<TaskGroup>, TaskError) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Box::new(move |h, g, e| Box::pin(f(h, g, e))));
        self
    }

    /// Callback fired exactly once per execution, regardless of outcome.
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Callback fired when the submission wait budget elapses.
    pub fn on_timeout(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }

    /// Maximum time to wait for a free slot at submission.
    ///
    /// Zero (the default) means "wait indefinitely".
    pub fn wait_timeout(mut self, d: Duration) -> Self {
        self.wait_timeout = d;
        self
    }

    /// Decrement the task group automatically on clean success.
    ///
    /// On error the `on_error` callback is responsible for the group.
    pub fn auto_done(mut self) -> Self {
        self.auto_done = true;
        self
    }

    /// Binds this submission to a task group.
    pub fn group(mut self, group: &TaskGroup) -> Self {
        self.group = Some(group.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_descriptor_has_no_job_and_waits_forever() {
        let opt = TaskOptions::new();
        assert!(opt.job.is_none());
        assert!(opt.on_error.is_none());
        assert!(!opt.auto_done);
        assert_eq!(opt.wait_timeout, Duration::ZERO);
    }

    #[test]
    fn setters_replace_previous_values() {
        let opt = TaskOptions::new()
            .task(|| async { Ok(()) })
            .wait_timeout(Duration::from_millis(5))
            .wait_timeout(Duration::from_millis(9))
            .auto_done()
            .group(&TaskGroup::new(1))
            .on_success(|| {})
            .on_complete(|| {})
            .on_timeout(|| {});

        assert!(opt.job.is_some());
        assert!(opt.auto_done);
        assert!(opt.group.is_some());
        assert_eq!(opt.wait_timeout, Duration::from_millis(9));
        assert!(opt.on_success.is_some());
        assert!(opt.on_complete.is_some());
        assert!(opt.on_timeout.is_some());
    }
}
