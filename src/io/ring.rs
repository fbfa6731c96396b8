use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::io::base::EventQueue;

/// Growable ring buffer queue. The default connector mailbox.
pub struct RingQueue<E> {
    inner: Mutex<VecDeque<E>>,
}

impl<E> RingQueue<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(8)),
        }
    }
}

impl<E> Default for RingQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + 'static> EventQueue<E> for RingQueue<E> {
    fn enqueue(&self, ev: E) -> usize {
        let mut q = self.inner.lock();
        q.push_back(ev);
        q.len()
    }

    fn dequeue(&self) -> Option<(E, usize)> {
        let mut q = self.inner.lock();
        let ev = q.pop_front()?;
        Some((ev, q.len()))
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
