use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::ReactorError;
use crate::frame::Frame;

pub use dedicated::NewThread;
pub use piggyback::Piggyback;
pub use pool::ThreadPool;
pub use timer::Timer;

mod dedicated;
mod piggyback;
mod pool;
mod timer;

/// Events dispatched per batch when neither the proto nor the system
/// config says otherwise.
pub const DEFAULT_EVENT_BUDGET: u32 = 50;

/// Built-in scheduler names registered by every system.
pub const DEFAULT: &str = "default";
pub const NEW_THREAD: &str = "new-thread";
pub const PIGGYBACK: &str = "piggyback";
pub const GLOBAL_POOL: &str = "global-execution-context";

/// Hook observing errors that escape a batch, for callers that need more
/// than the log line.
pub type FailureHook = Arc<dyn Fn(&ReactorError) + Send + Sync>;

/// Decides when a frame's batch runs.
///
/// `schedule` must make some worker eventually call
/// [`Frame::execute_batch`]. The frame's executing flag admits at most
/// one outstanding claim, so implementations never see the same frame
/// twice concurrently and need no dedup of their own.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, frame: Arc<Frame>);

    /// Top-level absorber for constructor and handler failures.
    fn on_failure(&self, frame: &Frame, err: &ReactorError) {
        tracing::error!("[Scheduler] reactor `{}` failed: {}", frame.name(), err);
    }
}

pub(crate) fn report_failure(hook: &Option<FailureHook>, frame: &Frame, err: &ReactorError) {
    tracing::error!("[Scheduler] reactor `{}` failed: {}", frame.name(), err);
    if let Some(hook) = hook {
        hook(err);
    }
}

/// Name-keyed scheduler registry owned by a reactor system.
pub struct SchedulerBundle {
    map: Mutex<AHashMap<String, Arc<dyn Scheduler>>>,
}

impl SchedulerBundle {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(AHashMap::new()),
        }
    }

    pub fn register(&self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) {
        let name = name.into();
        if self.map.lock().insert(name.clone(), scheduler).is_some() {
            tracing::warn!("[SchedulerBundle] replaced scheduler `{name}`");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.map.lock().get(name).cloned()
    }
}

/// Per-frame batch budget: the fairness mechanism on shared workers.
///
/// `on_batch_start` re-arms the budget, `on_batch_event` burns one unit,
/// and `can_consume` tells the frame whether another event may be
/// dispatched in the current batch. Totals are plain counters readable
/// from any thread.
pub struct SchedulerState {
    budget: u32,
    remaining: AtomicU32,
    batches: AtomicU64,
    events: AtomicU64,
}

impl SchedulerState {
    pub(crate) fn new(budget: u32) -> Self {
        let budget = budget.max(1);
        Self {
            budget,
            remaining: AtomicU32::new(budget),
            batches: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    pub(crate) fn on_batch_start(&self) {
        self.remaining.store(self.budget, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_batch_event(&self) {
        self.remaining.fetch_sub(1, Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn can_consume(&self) -> bool {
        self.remaining.load(Ordering::Relaxed) > 0
    }

    pub(crate) fn on_batch_stop(&self) {
        let used = self.budget - self.remaining.load(Ordering::Relaxed);
        if used > 0 {
            tracing::trace!("batch dispatched {used} events");
        }
    }

    #[inline]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    #[inline]
    pub fn total_batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}
