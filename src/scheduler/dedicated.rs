use ahash::AHashMap;
use crossbeam::channel;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

use crate::error::ReactorError;
use crate::frame::Frame;
use crate::scheduler::{FailureHook, Scheduler, report_failure};

/// One dedicated thread per frame; the thread loops on that frame only.
///
/// The right policy for reactors whose handlers are allowed to block:
/// they stall their own thread, never a shared worker.
pub struct NewThread {
    slots: Arc<Mutex<AHashMap<u64, channel::Sender<Arc<Frame>>>>>,
    failure_hook: Option<FailureHook>,
}

impl NewThread {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(AHashMap::new())),
            failure_hook: None,
        }
    }

    pub fn with_failure_hook(hook: FailureHook) -> Self {
        Self {
            slots: Arc::new(Mutex::new(AHashMap::new())),
            failure_hook: Some(hook),
        }
    }

    /// Number of frames with a live dedicated thread.
    pub fn active_threads(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Default for NewThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for NewThread {
    fn schedule(&self, frame: Arc<Frame>) {
        let mut slots = self.slots.lock();
        let uid = frame.uid();
        if let Some(tx) = slots.get(&uid) {
            if tx.send(frame.clone()).is_ok() {
                return;
            }
            // The thread exited after termination; drop the stale slot.
            slots.remove(&uid);
        }
        let (tx, rx) = channel::unbounded::<Arc<Frame>>();
        tx.send(frame.clone()).ok();
        slots.insert(uid, tx);

        let slots_ref = self.slots.clone();
        thread::Builder::new()
            .name(format!("reactor-{}", frame.name()))
            .spawn(move || {
                while let Ok(frame) = rx.recv() {
                    frame.execute_batch();
                    if frame.has_terminated() {
                        break;
                    }
                }
                slots_ref.lock().remove(&uid);
            })
            .expect("failed to spawn dedicated reactor thread");
    }

    fn on_failure(&self, frame: &Frame, err: &ReactorError) {
        report_failure(&self.failure_hook, frame, err);
    }
}
