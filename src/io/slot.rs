use parking_lot::Mutex;

use crate::io::base::EventQueue;

/// Single-slot queue: the latest event wins.
///
/// An overwrite keeps the size at 1; the frame's pending bookkeeping is
/// idempotent, so the repeated size-1 observation is harmless.
pub struct SlotQueue<E> {
    slot: Mutex<Option<E>>,
}

impl<E> SlotQueue<E> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<E> Default for SlotQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> EventQueue<E> for SlotQueue<E> {
    fn enqueue(&self, ev: E) -> usize {
        *self.slot.lock() = Some(ev);
        1
    }

    fn dequeue(&self) -> Option<(E, usize)> {
        self.slot.lock().take().map(|ev| (ev, 0))
    }

    fn len(&self) -> usize {
        usize::from(self.slot.lock().is_some())
    }
}
