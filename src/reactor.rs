use std::sync::Arc;

use crate::error::ReactorError;
use crate::events::Events;
use crate::frame::{Channel, Connector, Frame};
use crate::io::QueueKind;
use crate::scheduler::Scheduler;
use crate::system::ReactorSystem;

/// A reactor: an isolated unit of concurrency.
///
/// `init` runs on the reactor's own thread during its first batch; it
/// subscribes handlers on the scope's event streams and returns the
/// reactor object, which the runtime keeps alive until termination. All
/// handlers of one reactor run strictly one at a time.
pub trait Reactor: Send + Sized + 'static {
    /// Event type of the main channel.
    type Event: Send + 'static;

    fn init(scope: &ReactorScope<Self::Event>) -> anyhow::Result<Self>;
}

/// Lifecycle events published on a reactor's `system` event stream.
///
/// Order per reactor: `Started`, then `Scheduled`/`Preempted` around each
/// batch, then at most one `Died`, then exactly one `Terminated`.
#[derive(Debug, Clone)]
pub enum SysEvent {
    /// The reactor constructor completed.
    Started,
    /// A batch is about to dispatch events.
    Scheduled,
    /// The batch finished or exhausted its budget.
    Preempted,
    /// A handler panicked; the reactor terminates after this event.
    Died(Arc<anyhow::Error>),
    /// The frame reached its final state.
    Terminated,
    /// The system is shutting down; all connectors are being sealed.
    Shutdown,
}

/// Scheduler selection carried by a proto.
pub enum SchedulerChoice {
    Named(String),
    Direct(Arc<dyn Scheduler>),
}

/// Configuration template describing how to construct and schedule one
/// reactor.
pub struct Proto<R: Reactor> {
    pub(crate) name: Option<String>,
    pub(crate) scheduler: Option<SchedulerChoice>,
    pub(crate) channel_name: Option<String>,
    pub(crate) main_queue: QueueKind,
    pub(crate) event_budget: Option<u32>,
    pub(crate) factory:
        Box<dyn FnOnce(&ReactorScope<R::Event>) -> anyhow::Result<R> + Send>,
}

impl<R: Reactor> Proto<R> {
    pub fn new() -> Self {
        Self {
            name: None,
            scheduler: None,
            channel_name: None,
            main_queue: QueueKind::Unbounded,
            event_budget: None,
            factory: Box::new(R::init),
        }
    }

    /// Build the reactor with a custom closure instead of `R::init`.
    pub fn from_fn(
        f: impl FnOnce(&ReactorScope<R::Event>) -> anyhow::Result<R> + Send + 'static,
    ) -> Self {
        Self {
            factory: Box::new(f),
            ..Self::new()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_scheduler_name(mut self, name: impl Into<String>) -> Self {
        self.scheduler = Some(SchedulerChoice::Named(name.into()));
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(SchedulerChoice::Direct(scheduler));
        self
    }

    /// Name of the main channel (default `main`).
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    pub fn with_main_queue(mut self, kind: QueueKind) -> Self {
        self.main_queue = kind;
        self
    }

    /// Events dispatched per batch before the frame yields its worker.
    pub fn with_event_budget(mut self, budget: u32) -> Self {
        self.event_budget = Some(budget);
        self
    }
}

impl<R: Reactor> Default for Proto<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reactor-side handle to its own frame.
///
/// Cheap to clone; handlers capture clones to open more connectors, seal
/// existing ones, or reach the owning system from inside a batch.
pub struct ReactorScope<E: Send + 'static> {
    frame: Arc<Frame>,
    main: Arc<Connector<E>>,
    system: Arc<Connector<SysEvent>>,
}

impl<E: Send + 'static> Clone for ReactorScope<E> {
    fn clone(&self) -> Self {
        Self {
            frame: self.frame.clone(),
            main: self.main.clone(),
            system: self.system.clone(),
        }
    }
}

impl<E: Send + 'static> ReactorScope<E> {
    pub(crate) fn new(
        frame: Arc<Frame>,
        main: Arc<Connector<E>>,
        system: Arc<Connector<SysEvent>>,
    ) -> Self {
        Self { frame, main, system }
    }

    #[inline]
    pub fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.frame.name()
    }

    /// The main connector this reactor was spawned with.
    #[inline]
    pub fn main(&self) -> &Arc<Connector<E>> {
        &self.main
    }

    /// Lifecycle events of this reactor.
    #[inline]
    pub fn system_events(&self) -> &Events<SysEvent> {
        self.system.events()
    }

    /// Open an additional typed connector on this reactor.
    pub fn open_connector<T: Send + 'static>(
        &self,
        name: Option<&str>,
        kind: QueueKind,
        daemon: bool,
    ) -> Result<Arc<Connector<T>>, ReactorError> {
        self.frame.open_connector(name, kind, daemon)
    }

    /// Seal a connector by uid. Returns false when already sealed.
    pub fn seal(&self, uid: u64) -> bool {
        self.frame.seal_connector(uid)
    }

    /// Convenience: a send handle to this reactor's main channel.
    pub fn channel(&self) -> Channel<E> {
        self.main.channel()
    }

    /// The owning system, while it is alive.
    pub fn system(&self) -> Option<Arc<ReactorSystem>> {
        self.frame.system()
    }
}
