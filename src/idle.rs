//! # Closeable multi-producer multi-consumer queue of worker ids.
//!
//! [`IdleQueue`] backs the pool's idle-worker hints and its retired-worker
//! pool. Producers are workers and the pool; consumers are submitters (fast
//! path, non-blocking), retiring workers (awaitable) and `close` (drain).
//!
//! The queue composes a zero-permit [`Semaphore`] (availability signal) with
//! a mutex-guarded [`VecDeque`] (the ids). A permit is only added after the
//! id is pushed, so an acquired permit always has an id behind it.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::Semaphore;

use crate::error::PoolError;

pub(crate) struct IdleQueue {
    ready: Semaphore,
    ids: Mutex<VecDeque<usize>>,
}

impl IdleQueue {
    pub(crate) fn new() -> Self {
        Self {
            ready: Semaphore::new(0),
            ids: Mutex::new(VecDeque::new()),
        }
    }

    fn ids(&self) -> MutexGuard<'_, VecDeque<usize>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a worker id.
    pub(crate) fn put(&self, id: usize) {
        self.ids().push_back(id);
        self.ready.add_permits(1);
    }

    /// Takes an id without waiting; `None` when the queue is empty or closed.
    pub(crate) fn try_take(&self) -> Option<usize> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        self.ids().pop_front()
    }

    /// Takes an id, waiting until one is published.
    ///
    /// Fails with [`PoolError::Closed`] once the queue is closed.
    pub(crate) async fn take(&self) -> Result<usize, PoolError> {
        loop {
            let permit = self.ready.acquire().await.map_err(|_| PoolError::Closed)?;
            permit.forget();
            if let Some(id) = self.ids().pop_front() {
                return Ok(id);
            }
        }
    }

    /// Number of ids currently queued.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ready.available_permits()
    }

    /// Closes the queue, waking blocked takers with [`PoolError::Closed`].
    pub(crate) fn close(&self) {
        self.ready.close();
    }

    /// Removes and discards all queued ids.
    pub(crate) fn drain(&self) {
        self.ids().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[tokio::test]
    async fn fifo_put_and_try_take() {
        let q = IdleQueue::new();
        q.put(3);
        q.put(1);

        assert_eq!(q.len(), 2);
        assert_eq!(q.try_take(), Some(3));
        assert_eq!(q.try_take(), Some(1));
        assert_eq!(q.try_take(), None);
    }

    #[tokio::test]
    async fn take_waits_for_a_publisher() {
        let q = Arc::new(IdleQueue::new());

        let taker = {
            let q = q.clone();
            tokio::spawn(async move { q.take().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.put(7);

        let got = taker.await.expect("taker panicked");
        assert_eq!(got.expect("queue closed"), 7);
    }

    #[tokio::test]
    async fn close_wakes_blocked_takers() {
        let q = Arc::new(IdleQueue::new());

        let taker = {
            let q = q.clone();
            tokio::spawn(async move { q.take().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        q.close();

        let got = taker.await.expect("taker panicked");
        assert!(matches!(got, Err(PoolError::Closed)));
        assert_eq!(q.try_take(), None);
    }
}
