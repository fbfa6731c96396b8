use std::sync::Arc;

use crate::io::{BoundedQueue, RingQueue, SlotQueue};

/// FIFO mailbox of a single event type, shared between senders and the
/// owning frame.
///
/// `enqueue` returns the size *after* insertion so callers can detect the
/// 0->1 transition (the "just became non-empty" edge). `dequeue` returns
/// the popped event together with the remaining size observed at the same
/// linearisation point. Size and content always move together, so the
/// returned sizes are exact.
pub trait EventQueue<E: Send + 'static>: Send + Sync + 'static {
    /// Insert one event; returns the queue size after insertion.
    fn enqueue(&self, ev: E) -> usize;

    /// Pop the oldest event; returns it with the remaining size.
    fn dequeue(&self) -> Option<(E, usize)>;

    /// Current size. Advisory for concurrent readers.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queue implementation selected per connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Growable ring; never drops an event.
    Unbounded,
    /// Fixed capacity; drops the newest event when full.
    Bounded(usize),
    /// Keeps only the latest event. For sampled or tick-like sources.
    SingleSlot,
}

impl Default for QueueKind {
    fn default() -> Self {
        QueueKind::Unbounded
    }
}

impl QueueKind {
    pub(crate) fn build<E: Send + 'static>(self) -> Arc<dyn EventQueue<E>> {
        match self {
            QueueKind::Unbounded => Arc::new(RingQueue::new()),
            QueueKind::Bounded(cap) => Arc::new(BoundedQueue::new(cap)),
            QueueKind::SingleSlot => Arc::new(SlotQueue::new()),
        }
    }
}
