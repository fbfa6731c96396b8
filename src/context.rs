use std::cell::RefCell;
use std::sync::Arc;

use crate::frame::Frame;

thread_local! {
    static CURRENT_FRAME: RefCell<Option<Arc<Frame>>> = const { RefCell::new(None) };
}

/// The frame currently executing a batch on this thread, if any.
///
/// Lets reactor-internal code find its own frame to open more channels
/// or seal existing ones.
pub fn current_frame() -> Option<Arc<Frame>> {
    CURRENT_FRAME.with(|c| c.borrow().clone())
}

pub(crate) fn is_bound() -> bool {
    CURRENT_FRAME.with(|c| c.borrow().is_some())
}

/// Bind `frame` as this thread's current reactor for the duration of a
/// batch. Nested execution is a protocol violation and fails fast.
pub(crate) fn bind(frame: Arc<Frame>) -> ContextGuard {
    CURRENT_FRAME.with(|c| {
        let mut cur = c.borrow_mut();
        if let Some(bound) = cur.as_ref() {
            panic!(
                "nested reactor execution: frame `{}` entered while `{}` is bound on this thread",
                frame.name(),
                bound.name()
            );
        }
        *cur = Some(frame);
    });
    ContextGuard { _priv: () }
}

/// Unbinds the current frame on drop, on every exit path of a batch.
pub(crate) struct ContextGuard {
    _priv: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_FRAME.with(|c| c.borrow_mut().take());
    }
}
