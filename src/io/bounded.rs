use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::io::base::EventQueue;

/// Fixed-capacity queue that drops the newest event on overflow.
///
/// An overflowing `enqueue` returns the unchanged size, which is never 1
/// on a full queue, so overflow cannot fabricate a scheduling edge.
pub struct BoundedQueue<E> {
    cap: usize,
    inner: Mutex<VecDeque<E>>,
}

impl<E> BoundedQueue<E> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            inner: Mutex::new(VecDeque::with_capacity(cap)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

impl<E: Send + 'static> EventQueue<E> for BoundedQueue<E> {
    fn enqueue(&self, ev: E) -> usize {
        let mut q = self.inner.lock();
        if q.len() < self.cap {
            q.push_back(ev);
        }
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
