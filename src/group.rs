//! # Counting latch used by submitters to await a batch of tasks.
//!
//! A [`TaskGroup`] starts at a declared task count. Workers (or a retry
//! handle) decrement it as tasks finish; submitters call [`TaskGroup::wait`]
//! to block until the count reaches zero. Increments happen only at group
//! construction.
//!
//! Over-decrementing is a programming error: [`TaskGroup::done`] panics if it
//! is called more times than the declared task count.

use std::sync::Arc;

use tokio::sync::watch;

/// Counting latch over a batch of tasks.
///
/// Cloning yields another handle to the same latch; the clone given to a
/// descriptor via [`TaskOptions::group`](crate::TaskOptions::group) counts
/// toward the same batch.
#[derive(Clone)]
pub struct TaskGroup {
    count: Arc<watch::Sender<usize>>,
}

impl TaskGroup {
    /// Creates a latch initialized to `tasks`.
    pub fn new(tasks: usize) -> Self {
        let (tx, _rx) = watch::channel(tasks);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Decrements the latch by one.
    ///
    /// # Panics
    /// Panics if called more times than the count the group was created with.
    pub fn done(&self) {
        self.count.send_modify(|n| {
            *n = n
                .checked_sub(1)
                .expect("task group: done() called more times than the task count");
        });
    }

    /// Blocks until the latch reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in self, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Current remaining count.
    pub fn remaining(&self) -> usize {
        *self.count.borrow()
    }
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_once_count_reaches_zero() {
        let g = TaskGroup::new(2);
        assert_eq!(g.remaining(), 2);

        let waiter = {
            let g = g.clone();
            tokio::spawn(async move { g.wait().await })
        };

        g.done();
        assert_eq!(g.remaining(), 1);
        g.done();

        waiter.await.expect("waiter panicked");
        assert_eq!(g.remaining(), 0);
    }

    #[tokio::test]
    async fn wait_on_empty_group_returns_immediately() {
        let g = TaskGroup::new(0);
        g.wait().await;
    }

    #[tokio::test]
    #[should_panic(expected = "more times than the task count")]
    async fn over_decrement_panics() {
        let g = TaskGroup::new(1);
        g.done();
        g.done();
    }
}
