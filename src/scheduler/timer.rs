use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::ReactorError;
use crate::frame::Frame;
use crate::scheduler::{FailureHook, Scheduler, report_failure};
use crate::utils::CancelToken;

/// Re-schedules every registered frame each period, whether or not it
/// has pending events. Drives periodic reactors.
///
/// Batches run on the timer's own tick thread, so one slow handler
/// delays the other frames registered on the same timer.
pub struct Timer {
    period: Duration,
    frames: Arc<Mutex<Vec<Arc<Frame>>>>,
    cancel: CancelToken,
    started: AtomicBool,
    failure_hook: Option<FailureHook>,
}

impl Timer {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period: Duration::from_millis(period_ms.max(1)),
            frames: Arc::new(Mutex::new(Vec::new())),
            cancel: CancelToken::new_root(),
            started: AtomicBool::new(false),
            failure_hook: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.failure_hook = Some(hook);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn ensure_thread(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let frames = self.frames.clone();
        let cancel = self.cancel.new_child();
        let period = self.period;
        thread::Builder::new()
            .name(format!("reactor-timer-{}ms", period.as_millis()))
            .spawn(move || {
                while cancel.sleep_cancellable(period) {
                    let tick: Vec<Arc<Frame>> = {
                        let mut fs = frames.lock();
                        fs.retain(|f| !f.has_terminated());
                        fs.clone()
                    };
                    for frame in tick {
                        // Timer wakes are not event-driven, so the tick
                        // claims the executing flag itself.
                        if frame.claim_execution() {
                            frame.execute_batch();
                        }
                    }
                }
            })
            .expect("failed to spawn timer thread");
    }
}

impl Scheduler for Timer {
    fn schedule(&self, frame: Arc<Frame>) {
        {
            let mut fs = self.frames.lock();
            if !fs.iter().any(|f| f.uid() == frame.uid()) {
                fs.push(frame);
            }
        }
        self.ensure_thread();
    }

    fn on_failure(&self, frame: &Frame, err: &ReactorError) {
        report_failure(&self.failure_hook, frame, err);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
