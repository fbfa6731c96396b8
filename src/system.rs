use parking_lot::{Condvar, Mutex};
use signal_hook::consts::TERM_SIGNALS;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::config::SystemConfig;
use crate::error::ReactorError;
use crate::frame::{Channel, Frame, UniqueStore};
use crate::io::QueueKind;
use crate::reactor::{Proto, Reactor, ReactorScope, SchedulerChoice, SysEvent};
use crate::scheduler::{
    self, DEFAULT_EVENT_BUDGET, NewThread, Piggyback, Scheduler, SchedulerBundle, ThreadPool,
};
use crate::utils::{CancelToken, available_cores};

/// Process-wide reactor registry: spawns and names frames, owns the
/// scheduler bundle, and eventually terminates the world.
pub struct ReactorSystem {
    name: String,
    config: SystemConfig,
    myself: Weak<ReactorSystem>,
    frames: Mutex<UniqueStore<Arc<Frame>>>,
    drained: Condvar,
    bundle: SchedulerBundle,
    default_scheduler: Arc<dyn Scheduler>,
    shutdown_signal: CancelToken,
}

impl ReactorSystem {
    pub fn new(name: impl Into<String>, config: SystemConfig) -> Arc<Self> {
        let name = name.into();
        let workers = config.pool_workers.unwrap_or_else(|| available_cores().max(2));
        let pool: Arc<dyn Scheduler> = ThreadPool::with_options(workers, config.pin_workers, None);

        let bundle = SchedulerBundle::new();
        bundle.register(scheduler::DEFAULT, pool.clone());
        bundle.register(scheduler::GLOBAL_POOL, pool.clone());
        bundle.register(scheduler::NEW_THREAD, Arc::new(NewThread::new()));
        bundle.register(
            scheduler::PIGGYBACK,
            Arc::new(Piggyback::with_fallback(pool.clone())),
        );

        tracing::info!("[ReactorSystem] `{name}` up with {workers} pool workers");
        Arc::new_cyclic(|myself| Self {
            name,
            config,
            myself: myself.clone(),
            frames: Mutex::new(UniqueStore::new("reactor")),
            drained: Condvar::new(),
            bundle,
            default_scheduler: pool,
            shutdown_signal: CancelToken::new_root(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Live (non-terminated) reactors in this system.
    pub fn reactor_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Spawn a reactor described by `proto` and return the send handle to
    /// its main channel.
    ///
    /// The reactor constructor never runs on the calling thread: the
    /// frame is handed to its scheduler and `init` runs inside the first
    /// batch, observable through the `Started` lifecycle event.
    pub fn spawn<R: Reactor>(&self, proto: Proto<R>) -> Result<Channel<R::Event>, ReactorError> {
        if self.shutdown_signal.is_cancelled() {
            return Err(ReactorError::Terminated(self.name.clone()));
        }
        let Proto {
            name,
            scheduler: scheduler_choice,
            channel_name,
            main_queue,
            event_budget,
            factory,
        } = proto;

        let scheduler = match scheduler_choice {
            None => self.default_scheduler.clone(),
            Some(SchedulerChoice::Direct(s)) => s,
            Some(SchedulerChoice::Named(n)) => self
                .bundle
                .get(&n)
                .ok_or(ReactorError::UnknownScheduler(n))?,
        };
        let budget = event_budget
            .or(self.config.event_budget)
            .unwrap_or(DEFAULT_EVENT_BUDGET);

        // Register the frame under its (possibly synthesised) name first
        // so a duplicate name leaves nothing half-built.
        let frame = {
            let mut frames = self.frames.lock();
            if let Some(n) = name.as_deref()
                && frames.contains_name(n)
            {
                return Err(ReactorError::DuplicateName(n.to_string()));
            }
            let uid = frames.reserve_id();
            let frame_name: Arc<str> = match name {
                Some(n) => Arc::from(n.as_str()),
                None => frames.synthesize(uid),
            };
            let frame = Frame::new(uid, frame_name.clone(), scheduler, self.myself.clone(), budget);
            frames.try_store(uid, frame_name, frame.clone())?;
            frame
        };

        let opened = (|| {
            let main = frame.open_connector::<R::Event>(
                Some(channel_name.as_deref().unwrap_or("main")),
                main_queue,
                false,
            )?;
            let sys = frame.open_connector::<SysEvent>(Some("system"), QueueKind::Unbounded, true)?;
            Ok::<_, ReactorError>((main, sys))
        })();
        let (main, sys) = match opened {
            Ok(parts) => parts,
            Err(err) => {
                self.remove_frame(frame.uid());
                return Err(err);
            }
        };
        frame.set_sys_channel(sys.channel());

        let scope = ReactorScope::new(frame.clone(), main.clone(), sys.clone());
        frame.install(
            Box::new(move || factory(&scope).map(|iso| Box::new(iso) as Box<dyn Any + Send>)),
            sys,
        );

        let channel = main.channel();
        tracing::debug!(
            "[ReactorSystem] spawned reactor `{}` (uid {})",
            frame.name(),
            frame.uid()
        );
        frame.schedule_for_execution();
        Ok(channel)
    }

    /// Resolve a channel by `"reactor"` or `"reactor#channel"` path; the
    /// channel part defaults to `main`. Returns `None` when the reactor
    /// is gone, the connector is sealed away, or the event type differs.
    pub fn find_channel<E: Send + 'static>(&self, path: &str) -> Option<Channel<E>> {
        let (reactor, channel) = match path.split_once('#') {
            Some((r, c)) => (r, c),
            None => (path, "main"),
        };
        let frame = self.frames.lock().for_name(reactor).cloned()?;
        frame.connector_channel::<E>(channel)
    }

    pub fn register_scheduler(&self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) {
        self.bundle.register(name, scheduler);
    }

    pub fn scheduler(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.bundle.get(name)
    }

    pub fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.default_scheduler.clone()
    }

    /// Whether `shutdown` has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_signal.is_cancelled()
    }

    /// Terminate the world. Every frame is notified on its system
    /// connector, sealed, and force-terminated at its next batch
    /// boundary; the call blocks until the frame store drains.
    ///
    /// Idempotent. Must not be called from inside a reactor: the calling
    /// frame could never reach its own termination while blocked here.
    pub fn shutdown(&self) {
        if !self.shutdown_signal.is_cancelled() {
            tracing::info!("[ReactorSystem] `{}` shutting down", self.name);
        }
        self.shutdown_signal.cancel();

        let snapshot: Vec<Arc<Frame>> = self.frames.lock().values().cloned().collect();
        for frame in snapshot {
            frame.initiate_shutdown();
        }

        let mut frames = self.frames.lock();
        while !frames.is_empty() {
            self.drained.wait(&mut frames);
        }
        tracing::info!("[ReactorSystem] `{}` is down", self.name);
    }

    /// Trigger `shutdown` when the process receives a termination signal.
    /// The watcher thread exits once the system is gone or shut down.
    pub fn install_termination_signals(&self) -> anyhow::Result<()> {
        let flag = Arc::new(AtomicBool::new(false));
        for sig in TERM_SIGNALS {
            signal_hook::flag::register(*sig, flag.clone())?;
        }
        let system = self.myself.clone();
        let shutdown = self.shutdown_signal.new_child();
        thread::Builder::new()
            .name("reactor-signals".into())
            .spawn(move || {
                loop {
                    if flag.load(Ordering::Relaxed) {
                        if let Some(system) = system.upgrade() {
                            tracing::warn!("[ReactorSystem] termination signal received");
                            system.shutdown();
                        }
                        break;
                    }
                    if shutdown.is_cancelled() || system.strong_count() == 0 {
                        break;
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            })?;
        Ok(())
    }

    /// Called by frames on termination; wakes `shutdown` waiters.
    pub(crate) fn remove_frame(&self, uid: u64) {
        let removed = self.frames.lock().try_release_by_id(uid);
        if removed.is_some() {
            self.drained.notify_all();
        }
    }
}

impl std::fmt::Debug for ReactorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorSystem")
            .field("name", &self.name)
            .field("reactors", &self.reactor_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
