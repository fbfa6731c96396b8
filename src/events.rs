use parking_lot::Mutex;
use std::mem;

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// Reactor-local push stream.
///
/// Subscribers run on the owning reactor's thread, strictly one event at
/// a time. Subscribing while an event is being delivered is legal; the
/// new subscriber starts receiving from the next event.
pub struct Events<E> {
    subs: Mutex<Vec<Callback<E>>>,
}

impl<E: Send + 'static> Events<E> {
    pub(crate) fn new() -> Self {
        Self {
            subs: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler for every event pushed to this stream.
    pub fn subscribe(&self, f: impl FnMut(&E) + Send + 'static) {
        self.subs.lock().push(Box::new(f));
    }

    /// Deliver one event to every subscriber. Reactor thread only.
    pub(crate) fn emit(&self, ev: &E) {
        // The list is swapped out during delivery so a handler may
        // subscribe to its own stream mid-event.
        let mut active = mem::take(&mut *self.subs.lock());
        for sub in active.iter_mut() {
            sub(ev);
        }
        let mut subs = self.subs.lock();
        let added = mem::replace(&mut *subs, active);
        subs.extend(added);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs.lock().len()
    }
}
