#![forbid(unsafe_code)]

//! Ordered multi-producer, single-consumer stage queues.
//!
//! Both the message channel (feeding the reducer) and the render sink are
//! built on [`StageQueue`]. A queue accepts items from any thread without
//! blocking and guarantees that at most one *drain* is in flight at a time:
//!
//! 1. [`StageQueue::offer`] appends the item. If no drain is running it
//!    claims the drain and returns [`Offer::Claimed`]; the caller must then
//!    schedule a drain job on the stage's context.
//! 2. The drain job calls [`StageQueue::next`] until it returns `None`.
//!    Returning `None` releases the claim atomically with observing the empty
//!    queue, so an item offered concurrently is never stranded.
//! 3. [`StageQueue::close`] discards pending items; later offers are
//!    rejected and the running drain sees `None` at its next pull.
//!
//! Because the claim is held for the whole drain, items are consumed in
//! offer order even when the context runs jobs concurrently.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Outcome of [`StageQueue::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Offer {
    /// Queued, and the caller now owns the drain; schedule it.
    Claimed,
    /// Queued behind an active drain.
    Queued,
    /// The queue is closed; the item was dropped.
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    draining: bool,
    closed: bool,
}

/// Single-drain FIFO shared by producers on any thread.
pub struct StageQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> StageQueue<T> {
    /// Create an open, idle queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                draining: false,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an item.
    pub fn offer(&self, item: T) -> Offer {
        let mut state = self.lock();
        if state.closed {
            return Offer::Closed;
        }
        state.items.push_back(item);
        if state.draining {
            Offer::Queued
        } else {
            state.draining = true;
            Offer::Claimed
        }
    }

    /// Claim the drain without offering anything.
    ///
    /// Returns `true` if the caller now owns the drain and items are pending.
    #[cfg(test)]
    pub(crate) fn claim(&self) -> bool {
        let mut state = self.lock();
        if state.closed || state.draining || state.items.is_empty() {
            return false;
        }
        state.draining = true;
        true
    }

    /// Pull the next item for the drain owner.
    ///
    /// `None` means the queue is empty (or closed) and the claim has been
    /// released.
    pub fn next(&self) -> Option<T> {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(item) if !state.closed => Some(item),
            _ => {
                state.draining = false;
                None
            }
        }
    }

    /// Release the claim after an aborted drain, leaving items in place.
    pub fn release(&self) {
        self.lock().draining = false;
    }

    /// Reject all further offers and drop pending items.
    ///
    /// Returns the number of items discarded.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.items.len();
        state.items.clear();
        dropped
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Whether a drain currently owns the queue.
    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for StageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StageQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StageQueue")
            .field("pending", &state.items.len())
            .field("draining", &state.draining)
            .field("closed", &state.closed)
            .finish()
    }
}

/// The message channel in front of the reducer.
pub type MessageChannel<M> = StageQueue<M>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_offer_claims_drain() {
        let q = StageQueue::new();
        assert_eq!(q.offer(1), Offer::Claimed);
        assert_eq!(q.offer(2), Offer::Queued);
        assert!(q.is_draining());
    }

    #[test]
    fn next_releases_claim_when_empty() {
        let q = StageQueue::new();
        let _ = q.offer('a');
        assert_eq!(q.next(), Some('a'));
        assert_eq!(q.next(), None);
        assert!(!q.is_draining());
        assert_eq!(q.offer('b'), Offer::Claimed);
    }

    #[test]
    fn fifo_order_preserved() {
        let q = StageQueue::new();
        for i in 0..5 {
            let _ = q.offer(i);
        }
        let drained: Vec<_> = std::iter::from_fn(|| q.next()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn close_rejects_and_discards() {
        let q = StageQueue::new();
        let _ = q.offer(1);
        let _ = q.offer(2);
        assert_eq!(q.close(), 2);
        assert_eq!(q.offer(3), Offer::Closed);
        assert_eq!(q.next(), None);
        assert!(q.is_closed());
    }

    #[test]
    fn claim_only_with_pending_items() {
        let q = StageQueue::new();
        assert!(!q.claim());
        let _ = q.offer(1);
        q.release();
        assert!(q.claim());
        assert!(!q.claim());
    }

    #[test]
    fn concurrent_offers_claim_exactly_once_per_idle_period() {
        let q = Arc::new(StageQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    (0..250)
                        .filter(|i| q.offer(p * 1000 + i) == Offer::Claimed)
                        .count()
                })
            })
            .collect();
        let claims: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(claims, 1, "nothing drains, so only the first offer claims");
        assert_eq!(q.len(), 2000);
    }

    #[test]
    fn per_producer_order_survives_interleaving() {
        let q = Arc::new(StageQueue::new());
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        let _ = q.offer((p, i));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }
        let mut last = [None::<u32>; 4];
        while let Some((p, i)) = q.next() {
            let slot = &mut last[p as usize];
            assert!(slot.is_none_or(|prev| prev < i));
            *slot = Some(i);
        }
        assert!(last.iter().all(|s| *s == Some(499)));
    }
}
