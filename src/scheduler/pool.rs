use crossbeam::channel;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::ReactorError;
use crate::frame::Frame;
use crate::scheduler::{FailureHook, Scheduler, report_failure};
use crate::utils::{CancelToken, try_pin_nth};

/// Fixed worker pool. `schedule` pushes the frame onto a shared injector
/// channel; any idle worker picks it up and runs the batch.
///
/// A handler that blocks inside a batch blocks its worker until it
/// returns; reactors known to block belong on the `new-thread` policy.
pub struct ThreadPool {
    inject: Option<channel::Sender<Arc<Frame>>>,
    cancel: CancelToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    failure_hook: Option<FailureHook>,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Arc<Self> {
        Self::with_options(workers, false, None)
    }

    pub fn with_options(
        workers: usize,
        pin_workers: bool,
        failure_hook: Option<FailureHook>,
    ) -> Arc<Self> {
        let (tx, rx) = channel::unbounded::<Arc<Frame>>();
        let cancel = CancelToken::new_root();
        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = rx.clone();
            let cancel = cancel.new_child();
            let handle = thread::Builder::new()
                .name(format!("reactor-pool-{i}"))
                .spawn(move || {
                    if pin_workers {
                        match try_pin_nth(i) {
                            Ok(core_id) => {
                                tracing::info!("[ThreadPool] worker {i} pinned to core {core_id}")
                            }
                            Err(err) => {
                                tracing::warn!("[ThreadPool] worker {i} not pinned: {err}")
                            }
                        }
                    }
                    loop {
                        match rx.recv() {
                            Ok(frame) => frame.execute_batch(),
                            Err(_) => break,
                        }
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn pool worker");
            handles.push(handle);
        }
        Arc::new(Self {
            inject: Some(tx),
            cancel,
            workers: Mutex::new(handles),
            failure_hook,
        })
    }
}

impl Scheduler for ThreadPool {
    fn schedule(&self, frame: Arc<Frame>) {
        if let Some(tx) = &self.inject
            && tx.send(frame).is_err()
        {
            tracing::warn!("[ThreadPool] worker pool is gone; dropping schedule");
        }
    }

    fn on_failure(&self, frame: &Frame, err: &ReactorError) {
        report_failure(&self.failure_hook, frame, err);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.cancel.cancel();
        // Disconnect the injector so blocked workers wake and exit.
        self.inject = None;
        for handle in self.workers.get_mut().drain(..) {
            let _ = handle.join();
        }
    }
}
