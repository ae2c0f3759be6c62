//! # Error types used by the pool and by task executions.
//!
//! This module defines two main error enums:
//!
//! - [`PoolError`] errors surfaced synchronously to submitters and callers.
//! - [`TaskError`] errors raised by individual task executions.
//!
//! Both types provide helper methods `as_label` for metrics.
//! [`TaskError`] has an additional `is_panic()` method.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the pool itself.
///
/// These surface synchronously from [`Pool::add_task`](crate::Pool::add_task)
/// and [`Pool::with_config`](crate::Pool::with_config). Execution failures
/// never take this form; they are routed to the descriptor's error callback.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// Submitted descriptor has no work closure attached.
    #[error("task options contain no job")]
    MissingTask,

    /// No queue slot became available within the submission wait budget.
    ///
    /// By the time this is returned, `on_timeout` has already fired (if set)
    /// and auto-done has already decremented the task group (if set).
    #[error("no worker slot became available within {waited:?}")]
    Timeout {
        /// The wait budget that elapsed.
        waited: Duration,
    },

    /// The pool has been closed; no further submissions are accepted.
    #[error("pool is closed")]
    Closed,

    /// Pool construction was given an invalid configuration.
    #[error("invalid pool configuration: {reason}")]
    Config {
        /// Human-readable description of the rejected setting.
        reason: String,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::MissingTask => "pool_missing_task",
            PoolError::Timeout { .. } => "pool_submit_timeout",
            PoolError::Closed => "pool_closed",
            PoolError::Config { .. } => "pool_bad_config",
        }
    }
}

/// # Errors produced by task execution.
///
/// A job either returns [`TaskError::Fail`] itself, or panics and is reported
/// as [`TaskError::Panicked`] after the worker contains the unwind. Both are
/// delivered to the descriptor's `on_error` callback, never to the submitter.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The job ran to completion and reported a failure.
    #[error("execution failed: {reason}")]
    Fail { reason: String },

    /// The job panicked; the worker recovered and keeps running.
    #[error("task panicked: {reason}")]
    Panicked { reason: String },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Indicates whether this error came from a contained panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}

impl From<String> for TaskError {
    fn from(reason: String) -> Self {
        TaskError::Fail { reason }
    }
}

impl From<&str> for TaskError {
    fn from(reason: &str) -> Self {
        TaskError::Fail {
            reason: reason.to_string(),
        }
    }
}
