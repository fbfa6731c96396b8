use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::context;
use crate::error::ReactorError;
use crate::frame::Frame;
use crate::scheduler::{FailureHook, Scheduler, report_failure};

thread_local! {
    static RUN_QUEUE: RefCell<VecDeque<Arc<Frame>>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Runs batches directly on the calling thread.
///
/// Only legal when the caller is not already inside a reactor; from
/// inside one it delegates to the configured fallback, or fails
/// deterministically when there is none. Re-schedules produced by a
/// running batch go through a thread-local trampoline queue instead of
/// recursing.
pub struct Piggyback {
    fallback: Option<Arc<dyn Scheduler>>,
    failure_hook: Option<FailureHook>,
}

impl Piggyback {
    pub fn new() -> Self {
        Self {
            fallback: None,
            failure_hook: None,
        }
    }

    pub fn with_fallback(fallback: Arc<dyn Scheduler>) -> Self {
        Self {
            fallback: Some(fallback),
            failure_hook: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.failure_hook = Some(hook);
        self
    }
}

impl Default for Piggyback {
    fn default() -> Self {
        Self::new()
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|d| d.set(false));
    }
}

impl Scheduler for Piggyback {
    fn schedule(&self, frame: Arc<Frame>) {
        if context::is_bound() {
            match &self.fallback {
                Some(fallback) => fallback.schedule(frame),
                None => panic!(
                    "piggyback scheduler invoked from inside reactor `{}` with no fallback",
                    context::current_frame().map(|f| f.name().to_string()).unwrap_or_default()
                ),
            }
            return;
        }

        RUN_QUEUE.with(|q| q.borrow_mut().push_back(frame));
        if DRAINING.with(|d| d.get()) {
            // An outer schedule call on this thread is already draining.
            return;
        }
        DRAINING.with(|d| d.set(true));
        let _guard = DrainGuard;
        while let Some(next) = RUN_QUEUE.with(|q| q.borrow_mut().pop_front()) {
            next.execute_batch();
        }
    }

    fn on_failure(&self, frame: &Frame, err: &ReactorError) {
        report_failure(&self.failure_hook, frame, err);
    }
}
