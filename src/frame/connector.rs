use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::events::Events;
use crate::frame::Frame;
use crate::io::EventQueue;
use crate::utils::SharedFlag;

/// Typed mailbox of one reactor: a queue, its send side, and the
/// reactor-local event stream the queue drains into.
///
/// Senders touch only the queue (plus the frame monitor on the 0->1
/// edge); dequeueing and event delivery happen exclusively on the
/// owning reactor's executing thread.
pub struct Connector<E: Send + 'static> {
    uid: u64,
    name: Arc<str>,
    daemon: bool,
    frame: Weak<Frame>,
    queue: Arc<dyn EventQueue<E>>,
    events: Events<E>,
    open: SharedFlag,
    // Pending-FIFO membership bit; only flipped under the frame monitor.
    queued: AtomicBool,
}

impl<E: Send + 'static> Connector<E> {
    pub(crate) fn new(
        uid: u64,
        name: Arc<str>,
        daemon: bool,
        frame: Weak<Frame>,
        queue: Arc<dyn EventQueue<E>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uid,
            name,
            daemon,
            frame,
            queue,
            events: Events::new(),
            open: SharedFlag::new(true),
            queued: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    /// Whether the connector still accepts sends.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Event stream fed by this connector's queue.
    #[inline]
    pub fn events(&self) -> &Events<E> {
        &self.events
    }

    /// Mint a send handle addressing this connector.
    pub fn channel(&self) -> Channel<E> {
        Channel {
            frame: self.frame.clone(),
            uid: self.uid,
            queue: self.queue.clone(),
            open: self.open.clone(),
        }
    }

    /// Seal this connector on its owning frame. Queued events are still
    /// drained; new sends are dropped. Returns false when already sealed.
    pub fn seal(&self) -> bool {
        match self.frame.upgrade() {
            Some(frame) => frame.seal_connector(self.uid),
            None => false,
        }
    }
}

impl<E: Send + 'static> fmt::Debug for Connector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("daemon", &self.daemon)
            .field("open", &self.open.get())
            .field("queued_events", &self.queue.len())
            .finish()
    }
}

/// Frame-side type-erased view of a connector. Lets the frame hold
/// mailboxes of differing event types in one pending FIFO.
pub(crate) trait Mailbox: Send + Sync {
    fn uid(&self) -> u64;
    fn name(&self) -> &str;
    fn is_daemon(&self) -> bool;

    /// Mark the connector sealed. Queued events survive.
    fn close(&self);

    fn queue_len(&self) -> usize;

    /// Pop one event and push it through the emitter. Reactor thread
    /// only. Returns the remaining queue size, or `None` when empty.
    fn deliver_next(&self) -> Option<usize>;

    /// Swap the pending-FIFO membership bit; returns the previous value.
    /// Only called under the frame monitor.
    fn mark_queued(&self, queued: bool) -> bool;

    /// Typed recovery for the channel registry.
    fn as_any(&self) -> &dyn Any;
}

impl<E: Send + 'static> Mailbox for Connector<E> {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_daemon(&self) -> bool {
        self.daemon
    }

    fn close(&self) {
        self.open.down();
    }

    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn deliver_next(&self) -> Option<usize> {
        let (ev, remaining) = self.queue.dequeue()?;
        self.events.emit(&ev);
        Some(remaining)
    }

    fn mark_queued(&self, queued: bool) -> bool {
        self.queued.swap(queued, Ordering::Relaxed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Send-only handle addressing exactly one connector.
///
/// Clonable and shareable across threads. The target identity never
/// changes; after the connector seals or the reactor terminates every
/// send becomes a silent drop.
pub struct Channel<E: Send + 'static> {
    frame: Weak<Frame>,
    uid: u64,
    queue: Arc<dyn EventQueue<E>>,
    open: SharedFlag,
}

impl<E: Send + 'static> Clone for Channel<E> {
    fn clone(&self) -> Self {
        Self {
            frame: self.frame.clone(),
            uid: self.uid,
            queue: self.queue.clone(),
            open: self.open.clone(),
        }
    }
}

impl<E: Send + 'static> Channel<E> {
    /// Uid of the connector this channel addresses.
    #[inline]
    pub fn connector_uid(&self) -> u64 {
        self.uid
    }

    /// Whether the target connector still accepts sends.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Non-blocking send. Returns whether the event was accepted; sends
    /// to a sealed or terminated target are dropped.
    pub fn send(&self, ev: E) -> bool {
        if !self.open.get() {
            return false;
        }
        let Some(frame) = self.frame.upgrade() else {
            return false;
        };
        frame.enqueue_event(self.uid, self.queue.as_ref(), ev);
        true
    }
}

impl<E: Send + 'static> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("connector_uid", &self.uid)
            .field("open", &self.open.get())
            .finish()
    }
}
