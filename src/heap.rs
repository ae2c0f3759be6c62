//! # Min-heap of workers keyed by current load.
//!
//! [`LoadHeap`] orders worker identifiers by their load counter (tasks
//! enqueued or executing on that worker) and hands out the least-loaded
//! worker whose queue is not full. The counter table doubles as the pool's
//! load snapshot for [`Usage`](crate::Usage).
//!
//! All operations are thread-safe and serialized under one internal mutex;
//! the counters themselves are atomics so they can be read lock-free.
//!
//! Invariants:
//! - each worker appears at most once in the heap while it is alive;
//! - the key of worker `w` is exactly `counts[w]`;
//! - a worker whose counter equals `queue_len` is never returned by `pop`.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

/// Heap order and positions. Guarded by [`LoadHeap::core`].
struct Core {
    /// Binary-heap array of worker ids.
    keys: Vec<usize>,
    /// Worker id -> index in `keys`, `None` while not in the heap.
    pos: Vec<Option<usize>>,
}

pub(crate) struct LoadHeap {
    queue_len: usize,
    counts: Box<[AtomicUsize]>,
    core: Mutex<Core>,
}

impl LoadHeap {
    /// Creates an empty heap able to track `workers` identifiers.
    pub(crate) fn new(workers: usize, queue_len: usize) -> Self {
        Self {
            queue_len,
            counts: (0..workers).map(|_| AtomicUsize::new(0)).collect(),
            core: Mutex::new(Core {
                keys: Vec::with_capacity(workers),
                pos: vec![None; workers],
            }),
        }
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current load counter of `id` (zero for out-of-range ids).
    pub(crate) fn load(&self, id: usize) -> usize {
        self.counts
            .get(id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Inserts worker `id` with the given initial counter.
    ///
    /// No-op if `id` is out of range or already present.
    pub(crate) fn push(&self, id: usize, count: usize) {
        if id >= self.counts.len() {
            return;
        }
        let mut core = self.core();
        if core.pos[id].is_some() {
            return;
        }
        self.counts[id].store(count, Ordering::SeqCst);
        core.keys.push(id);
        let at = core.keys.len() - 1;
        core.pos[id] = Some(at);
        self.sift_up(&mut core, at);
    }

    /// Returns the least-loaded worker and reserves one unit of its load.
    ///
    /// Returns `None` if the heap is empty or the minimum is already at
    /// `queue_len` (then every live worker is at capacity). Never blocks.
    pub(crate) fn pop(&self) -> Option<usize> {
        let mut core = self.core();
        let top = *core.keys.first()?;
        if self.counts[top].load(Ordering::SeqCst) >= self.queue_len {
            return None;
        }
        self.counts[top].fetch_add(1, Ordering::SeqCst);
        self.sift_down(&mut core, 0);
        Some(top)
    }

    /// Cap-and-membership-checked increment, used to validate idle hints.
    ///
    /// Reserves one unit of load on `id` only while `id` is alive in the heap
    /// and below `queue_len`; returns whether the reservation was made.
    pub(crate) fn reserve(&self, id: usize) -> bool {
        if id >= self.counts.len() {
            return false;
        }
        let mut core = self.core();
        let Some(at) = core.pos[id] else {
            return false;
        };
        if self.counts[id].load(Ordering::SeqCst) >= self.queue_len {
            return false;
        }
        self.counts[id].fetch_add(1, Ordering::SeqCst);
        self.sift_down(&mut core, at);
        true
    }

    /// Decrements the counter of `id` (saturating at zero) and re-sifts.
    ///
    /// The counter updates even while `id` is not in the heap (a retiring
    /// worker still drains its queue); out-of-range ids are ignored.
    pub(crate) fn decrement(&self, id: usize) {
        if id >= self.counts.len() {
            return;
        }
        let mut core = self.core();
        let _ = self.counts[id].fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
            c.checked_sub(1)
        });
        if let Some(at) = core.pos[id] {
            self.sift_up(&mut core, at);
        }
    }

    /// Removes `id` from the heap; its counter is left as-is.
    ///
    /// No-op for ids that are out of range or not in the heap.
    pub(crate) fn delete(&self, id: usize) {
        if id >= self.counts.len() {
            return;
        }
        let mut core = self.core();
        let Some(at) = core.pos[id].take() else {
            return;
        };
        let last = core.keys.len() - 1;
        core.keys.swap(at, last);
        core.keys.pop();
        if at < core.keys.len() {
            let moved = core.keys[at];
            core.pos[moved] = Some(at);
            self.sift_down(&mut core, at);
            self.sift_up(&mut core, at);
        }
    }

    /// Number of workers currently in the heap.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.core().keys.len()
    }

    /// Drops the heap order and positions. Counters are left readable.
    pub(crate) fn close(&self) {
        let mut core = self.core();
        core.keys.clear();
        core.pos.fill(None);
    }

    fn key(&self, id: usize) -> usize {
        self.counts[id].load(Ordering::SeqCst)
    }

    fn swap(&self, core: &mut Core, a: usize, b: usize) {
        core.keys.swap(a, b);
        let (ka, kb) = (core.keys[a], core.keys[b]);
        core.pos[ka] = Some(a);
        core.pos[kb] = Some(b);
    }

    fn sift_up(&self, core: &mut Core, mut at: usize) {
        while at > 0 {
            let parent = (at - 1) / 2;
            if self.key(core.keys[at]) < self.key(core.keys[parent]) {
                self.swap(core, at, parent);
                at = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&self, core: &mut Core, mut at: usize) {
        loop {
            let left = 2 * at + 1;
            let right = left + 1;
            let mut smallest = at;
            if left < core.keys.len() && self.key(core.keys[left]) < self.key(core.keys[smallest]) {
                smallest = left;
            }
            if right < core.keys.len() && self.key(core.keys[right]) < self.key(core.keys[smallest])
            {
                smallest = right;
            }
            if smallest == at {
                break;
            }
            self.swap(core, at, smallest);
            at = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_least_loaded_and_reserves() {
        let h = LoadHeap::new(3, 10);
        h.push(0, 5);
        h.push(1, 2);
        h.push(2, 7);

        assert_eq!(h.pop(), Some(1));
        assert_eq!(h.load(1), 3);
        // Still the minimum after the reservation.
        assert_eq!(h.pop(), Some(1));
        assert_eq!(h.load(1), 4);
    }

    #[test]
    fn pop_rejects_workers_at_capacity() {
        let h = LoadHeap::new(2, 1);
        h.push(0, 1);
        h.push(1, 1);
        // Minimum is at queue_len, so every worker is full.
        assert_eq!(h.pop(), None);
        assert_eq!(h.load(0), 1);
    }

    #[test]
    fn pop_on_empty_heap_is_none() {
        let h = LoadHeap::new(2, 4);
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn pop_spreads_across_equally_loaded_workers() {
        let h = LoadHeap::new(2, 1);
        h.push(0, 0);
        h.push(1, 0);

        let (a, b) = (h.pop().unwrap(), h.pop().unwrap());
        assert_ne!(a, b);
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn reserve_checks_cap_and_membership() {
        let h = LoadHeap::new(3, 2);
        h.push(0, 1);

        assert!(h.reserve(0));
        assert_eq!(h.load(0), 2);
        // At capacity now.
        assert!(!h.reserve(0));
        // Never pushed.
        assert!(!h.reserve(1));
        // Out of range.
        assert!(!h.reserve(9));
    }

    #[test]
    fn decrement_resifts_and_saturates_at_zero() {
        let h = LoadHeap::new(2, 4);
        h.push(0, 2);
        h.push(1, 1);

        assert_eq!(h.pop(), Some(1));
        h.decrement(0);
        h.decrement(0);
        assert_eq!(h.load(0), 0);
        h.decrement(0);
        assert_eq!(h.load(0), 0);
        assert_eq!(h.pop(), Some(0));
    }

    #[test]
    fn decrement_without_membership_updates_counter_only() {
        let h = LoadHeap::new(2, 4);
        h.push(0, 1);
        h.push(1, 2);
        h.delete(1);
        h.decrement(1);
        assert_eq!(h.load(1), 1);
        assert_eq!(h.pop(), Some(0));
        // Out of range is ignored entirely.
        h.decrement(7);
    }

    #[test]
    fn delete_removes_and_ignores_unknown() {
        let h = LoadHeap::new(3, 4);
        h.push(0, 0);
        h.push(1, 3);
        h.push(2, 1);

        h.delete(0);
        assert_eq!(h.len(), 2);
        assert_eq!(h.pop(), Some(2));

        h.delete(0);
        h.delete(9);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn push_twice_is_a_noop() {
        let h = LoadHeap::new(2, 4);
        h.push(0, 0);
        h.push(0, 3);
        assert_eq!(h.len(), 1);
        assert_eq!(h.load(0), 0);
    }

    #[test]
    fn close_empties_the_heap() {
        let h = LoadHeap::new(2, 4);
        h.push(0, 1);
        h.push(1, 2);
        h.close();
        assert_eq!(h.pop(), None);
        // Counters stay readable for reports.
        assert_eq!(h.load(1), 2);
    }
}
