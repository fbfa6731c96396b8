use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

use crate::context;
use crate::error::ReactorError;
use crate::io::{EventQueue, QueueKind};
use crate::reactor::SysEvent;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::system::ReactorSystem;

pub use connector::{Channel, Connector};
pub use registry::UniqueStore;

pub(crate) use connector::Mailbox;

mod connector;
mod registry;

/// Lifecycle of a frame. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Fresh,
    Running,
    Terminated,
}

/// Type-erased reactor factory; built at spawn, consumed on the first
/// batch so the constructor never runs on the spawning thread.
pub(crate) type ErasedFactory =
    Box<dyn FnOnce() -> anyhow::Result<Box<dyn Any + Send>> + Send>;

/// Per-reactor bookkeeping: mailboxes, lifecycle, scheduling flag.
///
/// All cross-thread state sits behind the frame monitor. Reactor-thread
/// state (the reactor object, the typed system connector) lives in the
/// batch cell, which is uncontended because the executing flag admits at
/// most one worker at a time.
pub struct Frame {
    uid: u64,
    name: Arc<str>,
    myself: Weak<Frame>,
    scheduler: Arc<dyn Scheduler>,
    system: Weak<ReactorSystem>,
    stats: SchedulerState,
    monitor: Mutex<FrameState>,
    batch: Mutex<BatchCell>,
    sys_channel: OnceLock<Channel<SysEvent>>,
}

struct FrameState {
    lifecycle: Lifecycle,
    executing: bool,
    forced: bool,
    non_daemon: usize,
    connectors: UniqueStore<Arc<dyn Mailbox>>,
    // Connectors with non-empty queues; each appears at most once.
    pending: VecDeque<Arc<dyn Mailbox>>,
}

struct BatchCell {
    factory: Option<ErasedFactory>,
    iso: Option<Box<dyn Any + Send>>,
    sys: Option<Arc<Connector<SysEvent>>>,
}

impl Frame {
    pub(crate) fn new(
        uid: u64,
        name: Arc<str>,
        scheduler: Arc<dyn Scheduler>,
        system: Weak<ReactorSystem>,
        event_budget: u32,
    ) -> Arc<Self> {
        Arc::new_cyclic(|myself| Self {
            uid,
            name,
            myself: myself.clone(),
            scheduler,
            system,
            stats: SchedulerState::new(event_budget),
            monitor: Mutex::new(FrameState {
                lifecycle: Lifecycle::Fresh,
                executing: false,
                forced: false,
                non_daemon: 0,
                connectors: UniqueStore::new("channel"),
                pending: VecDeque::new(),
            }),
            batch: Mutex::new(BatchCell {
                factory: None,
                iso: None,
                sys: None,
            }),
            sys_channel: OnceLock::new(),
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

    /// Per-frame batch budget and dispatch totals.
    #[inline]
    pub fn stats(&self) -> &SchedulerState {
        &self.stats
    }

    /// The system this frame was spawned in, while it is alive.
    pub fn system(&self) -> Option<Arc<ReactorSystem>> {
        self.system.upgrade()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.monitor.lock().lifecycle
    }

    pub fn has_terminated(&self) -> bool {
        self.lifecycle() == Lifecycle::Terminated
    }

    pub fn is_executing(&self) -> bool {
        self.monitor.lock().executing
    }

    pub fn has_pending_events(&self) -> bool {
        !self.monitor.lock().pending.is_empty()
    }

    /// Sum of queue sizes across pending connectors. Advisory only: the
    /// sizes are read one connector at a time, not atomically.
    pub fn estimate_total_pending_events(&self) -> usize {
        self.monitor.lock().pending.iter().map(|c| c.queue_len()).sum()
    }

    /// Open a new typed connector on this frame. Fails once the reactor
    /// has terminated, and on a duplicate connector name.
    pub fn open_connector<E: Send + 'static>(
        &self,
        name: Option<&str>,
        kind: QueueKind,
        daemon: bool,
    ) -> Result<Arc<Connector<E>>, ReactorError> {
        let queue = kind.build::<E>();
        let mut st = self.monitor.lock();
        if st.lifecycle == Lifecycle::Terminated {
            return Err(ReactorError::Terminated(self.name.to_string()));
        }
        if let Some(n) = name
            && st.connectors.contains_name(n)
        {
            return Err(ReactorError::DuplicateName(n.to_string()));
        }
        let uid = st.connectors.reserve_id();
        let conn_name: Arc<str> = match name {
            Some(n) => Arc::from(n),
            None => st.connectors.synthesize(uid),
        };
        let conn = Connector::new(uid, conn_name.clone(), daemon, self.myself.clone(), queue);
        let erased: Arc<dyn Mailbox> = conn.clone();
        st.connectors.try_store(uid, conn_name, erased)?;
        if !daemon {
            st.non_daemon += 1;
        }
        Ok(conn)
    }

    /// The canonical sender path. The queue insert is lock-free with
    /// respect to the monitor; only the 0->1 edge takes it to register
    /// the connector and claim the scheduling flag.
    pub(crate) fn enqueue_event<E: Send + 'static>(
        &self,
        uid: u64,
        queue: &dyn EventQueue<E>,
        ev: E,
    ) {
        let size = queue.enqueue(ev);
        if size == 1 {
            self.register_pending(uid);
        }
    }

    fn register_pending(&self, uid: u64) {
        let wake = {
            let mut st = self.monitor.lock();
            if st.lifecycle == Lifecycle::Terminated {
                return;
            }
            let Some(conn) = st.connectors.for_id(uid).cloned() else {
                // Sealed and released; the queued event dies with it.
                return;
            };
            if !conn.mark_queued(true) {
                st.pending.push_back(conn);
            }
            if st.executing {
                false
            } else {
                st.executing = true;
                true
            }
        };
        if wake && let Some(me) = self.myself.upgrade() {
            self.scheduler.schedule(me);
        }
    }

    /// Claim the scheduling flag and hand the frame to its scheduler,
    /// without enqueueing anything. Idempotent while already executing.
    pub fn schedule_for_execution(&self) {
        let wake = {
            let mut st = self.monitor.lock();
            if st.lifecycle == Lifecycle::Terminated || st.executing {
                false
            } else {
                st.executing = true;
                true
            }
        };
        if wake && let Some(me) = self.myself.upgrade() {
            self.scheduler.schedule(me);
        }
    }

    /// Timer-style claim: take the executing flag without going through
    /// the scheduler. Returns false for terminated frames.
    pub(crate) fn claim_execution(&self) -> bool {
        let mut st = self.monitor.lock();
        if st.lifecycle == Lifecycle::Terminated {
            return false;
        }
        st.executing = true;
        true
    }

    /// Seal the connector with `uid`: new sends are dropped, already
    /// queued events are still drained on subsequent batches. Idempotent;
    /// returns false when nothing was sealed.
    pub fn seal_connector(&self, uid: u64) -> bool {
        let sealed = {
            let mut st = self.monitor.lock();
            match st.connectors.try_release_by_id(uid) {
                Some(conn) => {
                    conn.close();
                    if !conn.is_daemon() {
                        st.non_daemon -= 1;
                    }
                    true
                }
                None => false,
            }
        };
        if sealed {
            // Wake the frame so the termination check runs even when idle.
            self.schedule_for_execution();
        }
        sealed
    }

    /// Resolve a typed channel to one of this frame's connectors by name.
    pub(crate) fn connector_channel<E: Send + 'static>(&self, name: &str) -> Option<Channel<E>> {
        let st = self.monitor.lock();
        let conn = st.connectors.for_name(name)?;
        conn.as_any()
            .downcast_ref::<Connector<E>>()
            .map(|c| c.channel())
    }

    pub(crate) fn set_sys_channel(&self, ch: Channel<SysEvent>) {
        let _ = self.sys_channel.set(ch);
    }

    pub(crate) fn install(&self, factory: ErasedFactory, sys: Arc<Connector<SysEvent>>) {
        let mut batch = self.batch.lock();
        batch.factory = Some(factory);
        batch.sys = Some(sys);
    }

    /// System shutdown path: notify the reactor on its system connector,
    /// seal everything, and force termination at the next batch boundary.
    pub(crate) fn initiate_shutdown(&self) {
        if let Some(sys) = self.sys_channel.get() {
            sys.send(SysEvent::Shutdown);
        }
        {
            let mut st = self.monitor.lock();
            if st.lifecycle == Lifecycle::Terminated {
                return;
            }
            st.forced = true;
            for conn in st.connectors.drain() {
                conn.close();
            }
            st.non_daemon = 0;
        }
        self.schedule_for_execution();
    }

    /// One batch of this frame, run by a scheduler worker.
    ///
    /// Preconditions: the executing flag is claimed for this call, and the
    /// current thread has no other frame bound (nested execution fails
    /// fast inside `context::bind`).
    pub fn execute_batch(&self) {
        let Some(me) = self.myself.upgrade() else {
            return;
        };
        let ctx_guard = context::bind(me);
        let mut batch = self.batch.lock();

        // Fresh path: materialise the reactor before any dispatch.
        let fresh = {
            let mut st = self.monitor.lock();
            match st.lifecycle {
                Lifecycle::Fresh => {
                    st.lifecycle = Lifecycle::Running;
                    true
                }
                Lifecycle::Running => false,
                Lifecycle::Terminated => {
                    st.executing = false;
                    return;
                }
            }
        };

        if fresh {
            match batch.factory.take() {
                None => {
                    let err = anyhow::anyhow!("frame `{}` has no reactor factory", self.name);
                    self.fail_fresh(&mut batch, ReactorError::Ctor(Arc::new(err)));
                    return;
                }
                Some(factory) => match panic::catch_unwind(AssertUnwindSafe(factory)) {
                    Ok(Ok(iso)) => {
                        batch.iso = Some(iso);
                        self.emit_sys(&batch, &SysEvent::Started);
                    }
                    Ok(Err(err)) => {
                        self.fail_fresh(&mut batch, ReactorError::Ctor(Arc::new(err)));
                        return;
                    }
                    Err(payload) => {
                        let err = anyhow::anyhow!(
                            "reactor constructor panicked: {}",
                            panic_message(payload)
                        );
                        self.fail_fresh(&mut batch, ReactorError::Ctor(Arc::new(err)));
                        return;
                    }
                },
            }
        }

        // Dispatch pending events under the batch budget. A handler
        // panic is caught once, at the batch boundary.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.emit_sys(&batch, &SysEvent::Scheduled);
            self.stats.on_batch_start();
            self.drain_pending();
        }));
        self.stats.on_batch_stop();

        self.emit_sys(&batch, &SysEvent::Preempted);

        if let Err(payload) = outcome {
            let cause = Arc::new(anyhow::anyhow!(
                "event handler panicked: {}",
                panic_message(payload)
            ));
            let err = ReactorError::Handler(cause.clone());
            self.scheduler.on_failure(self, &err);
            // No reactor, no Died: a death can only be observed by the
            // object whose handler threw.
            if batch.iso.is_some() {
                self.emit_sys(&batch, &SysEvent::Died(cause));
            }
            self.monitor.lock().forced = true;
        }

        // Termination check.
        let terminate = {
            let mut st = self.monitor.lock();
            if st.lifecycle == Lifecycle::Running
                && (st.forced || (st.pending.is_empty() && st.non_daemon == 0))
            {
                st.lifecycle = Lifecycle::Terminated;
                true
            } else {
                false
            }
        };

        if terminate {
            self.emit_sys(&batch, &SysEvent::Terminated);
            self.teardown(&mut batch);
            self.monitor.lock().executing = false;
            return;
        }

        // Re-schedule decision.
        let reschedule = {
            let mut st = self.monitor.lock();
            if st.pending.is_empty() {
                st.executing = false;
                false
            } else {
                true
            }
        };
        drop(batch);
        drop(ctx_guard);
        if reschedule && let Some(me) = self.myself.upgrade() {
            self.scheduler.schedule(me);
        }
    }

    fn drain_pending(&self) {
        loop {
            let conn = {
                let mut st = self.monitor.lock();
                match st.pending.pop_front() {
                    Some(conn) => {
                        conn.mark_queued(false);
                        conn
                    }
                    None => break,
                }
            };
            loop {
                if !self.stats.can_consume() {
                    // Budget exhausted: park the connector so the next
                    // batch resumes it.
                    let mut st = self.monitor.lock();
                    if conn.queue_len() > 0 && !conn.mark_queued(true) {
                        st.pending.push_back(conn.clone());
                    }
                    return;
                }
                match conn.deliver_next() {
                    None => break,
                    Some(remaining) => {
                        self.stats.on_batch_event();
                        if remaining == 0 {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn emit_sys(&self, batch: &BatchCell, ev: &SysEvent) {
        if let Some(sys) = batch.sys.as_ref() {
            sys.events().emit(ev);
        }
    }

    /// Constructor failure: no reactor exists, so no lifecycle events
    /// flow through it. The frame is torn down and unregistered.
    fn fail_fresh(&self, batch: &mut BatchCell, err: ReactorError) {
        self.scheduler.on_failure(self, &err);
        self.monitor.lock().lifecycle = Lifecycle::Terminated;
        self.teardown(batch);
        self.monitor.lock().executing = false;
    }

    fn teardown(&self, batch: &mut BatchCell) {
        {
            let mut st = self.monitor.lock();
            for conn in st.connectors.drain() {
                conn.close();
            }
            st.pending.clear();
            st.non_daemon = 0;
        }
        batch.factory = None;
        batch.iso = None;
        batch.sys = None;
        if let Some(system) = self.system.upgrade() {
            system.remove_frame(self.uid);
        }
        tracing::debug!("[Frame] reactor `{}` terminated", self.name);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic (unknown type)".into())
}
