#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use anyhow::anyhow;
    use crossbeam::channel;
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    // ---- helpers

    fn wait_until(dur: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < dur {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn sys_tag(ev: &SysEvent) -> &'static str {
        match ev {
            SysEvent::Started => "started",
            SysEvent::Scheduled => "scheduled",
            SysEvent::Preempted => "preempted",
            SysEvent::Died(_) => "died",
            SysEvent::Terminated => "terminated",
            SysEvent::Shutdown => "shutdown",
        }
    }

    /// Reactor shell for closure-built protos; all behaviour lives in the
    /// handlers subscribed by the proto's factory.
    struct Probe<E>(PhantomData<E>);

    impl<E: Send + 'static> Reactor for Probe<E> {
        type Event = E;

        fn init(_scope: &ReactorScope<E>) -> anyhow::Result<Self> {
            Ok(Probe(PhantomData))
        }
    }

    // ---- scenarios

    #[test]
    fn delivers_and_terminates_after_seal() {
        let system = ReactorSystem::new("sys-a", SystemConfig::default());
        let sink = Arc::new(Mutex::new(Vec::<String>::new()));
        let sys_log = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let ch = system
            .spawn(Proto::<Probe<String>>::from_fn({
                let sink = sink.clone();
                let sys_log = sys_log.clone();
                move |scope| {
                    {
                        let sys_log = sys_log.clone();
                        scope.system_events().subscribe(move |ev| {
                            sys_log.lock().unwrap().push(sys_tag(ev));
                        });
                    }
                    let main = scope.main().clone();
                    scope.main().events().subscribe(move |ev: &String| {
                        sink.lock().unwrap().push(ev.clone());
                        main.seal();
                    });
                    Ok(Probe(PhantomData))
                }
            }))
            .unwrap();

        assert!(ch.send("Hola!".to_string()));
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));

        assert_eq!(*sink.lock().unwrap(), ["Hola!".to_string()]);
        let log = sys_log.lock().unwrap();
        assert_eq!(log.iter().filter(|t| **t == "started").count(), 1);
        assert_eq!(log.iter().filter(|t| **t == "terminated").count(), 1);
        let started = log.iter().position(|t| *t == "started").unwrap();
        let terminated = log.iter().position(|t| *t == "terminated").unwrap();
        assert!(started < terminated);
    }

    #[test]
    fn per_connector_fifo_across_two_connectors() {
        let system = ReactorSystem::new("sys-b", SystemConfig::default());
        let main_sink = Arc::new(Mutex::new(Vec::<u32>::new()));
        let aux_sink = Arc::new(Mutex::new(Vec::<i64>::new()));
        let (aux_tx, aux_rx) = channel::bounded::<Channel<i64>>(1);
        let (scope_tx, scope_rx) = channel::bounded::<ReactorScope<u32>>(1);

        let main_ch = system
            .spawn(Proto::<Probe<u32>>::from_fn({
                let main_sink = main_sink.clone();
                let aux_sink = aux_sink.clone();
                move |scope| {
                    let aux =
                        scope.open_connector::<i64>(Some("aux"), QueueKind::Unbounded, false)?;
                    aux_tx.send(aux.channel()).ok();
                    scope_tx.send(scope.clone()).ok();
                    {
                        let aux_sink = aux_sink.clone();
                        aux.events()
                            .subscribe(move |ev| aux_sink.lock().unwrap().push(*ev));
                    }
                    scope
                        .main()
                        .events()
                        .subscribe(move |ev| main_sink.lock().unwrap().push(*ev));
                    Ok(Probe(PhantomData))
                }
            }))
            .unwrap();

        let aux_ch = aux_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let scope = scope_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let t1 = thread::spawn({
            let main_ch = main_ch.clone();
            move || {
                for i in [1u32, 2, 3] {
                    main_ch.send(i);
                }
            }
        });
        let t2 = thread::spawn({
            let aux_ch = aux_ch.clone();
            move || {
                for i in [10i64, 20] {
                    aux_ch.send(i);
                }
            }
        });
        t1.join().unwrap();
        t2.join().unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            main_sink.lock().unwrap().len() == 3 && aux_sink.lock().unwrap().len() == 2
        }));
        assert_eq!(*main_sink.lock().unwrap(), [1, 2, 3]);
        assert_eq!(*aux_sink.lock().unwrap(), [10, 20]);

        // Seal both non-daemon connectors; the reactor drains and goes down.
        scope.main().seal();
        scope.seal(aux_ch.connector_uid());
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));
    }

    #[test]
    fn hub_receives_all_events_serially() {
        const SENDERS: u64 = 100;
        const PER_SENDER: u64 = 1000;

        let system = ReactorSystem::new("sys-c", SystemConfig::default());
        let received = Arc::new(AtomicU64::new(0));
        let in_handler = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        let hub = system
            .spawn(
                Proto::<Probe<u64>>::from_fn({
                    let received = received.clone();
                    let in_handler = in_handler.clone();
                    let overlapped = overlapped.clone();
                    move |scope| {
                        scope.main().events().subscribe(move |_| {
                            if in_handler.swap(true, Ordering::SeqCst) {
                                overlapped.store(true, Ordering::SeqCst);
                            }
                            received.fetch_add(1, Ordering::SeqCst);
                            in_handler.store(false, Ordering::SeqCst);
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_name("hub"),
            )
            .unwrap();

        for _ in 0..SENDERS {
            let hub_ch = hub.clone();
            system
                .spawn(Proto::<Probe<()>>::from_fn(move |scope| {
                    for i in 0..PER_SENDER {
                        hub_ch.send(i);
                    }
                    scope.main().seal();
                    Ok(Probe(PhantomData))
                }))
                .unwrap();
        }

        assert!(wait_until(Duration::from_secs(30), || {
            received.load(Ordering::SeqCst) == SENDERS * PER_SENDER
        }));
        assert_eq!(received.load(Ordering::SeqCst), SENDERS * PER_SENDER);
        assert!(!overlapped.load(Ordering::SeqCst));

        // Sender reactors sealed themselves; only the hub stays up.
        assert!(wait_until(Duration::from_secs(5), || system.reactor_count() == 1));
        system.shutdown();
        assert_eq!(system.reactor_count(), 0);
    }

    #[test]
    fn handler_panic_reports_dies_and_terminates() {
        let (err_tx, err_rx) = channel::unbounded::<ReactorError>();
        let hook: FailureHook = Arc::new(move |err: &ReactorError| {
            err_tx.send(err.clone()).ok();
        });
        let pool = ThreadPool::with_options(2, false, Some(hook));

        let system = ReactorSystem::new("sys-d", SystemConfig::default());
        let sink = Arc::new(Mutex::new(Vec::<u32>::new()));
        let sys_log = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let ch = system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let sink = sink.clone();
                    let sys_log = sys_log.clone();
                    move |scope| {
                        {
                            let sys_log = sys_log.clone();
                            scope.system_events().subscribe(move |ev| {
                                sys_log.lock().unwrap().push(sys_tag(ev));
                            });
                        }
                        scope.main().events().subscribe(move |ev: &u32| {
                            if *ev == 5 {
                                panic!("sentinel handler failure");
                            }
                            sink.lock().unwrap().push(*ev);
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_scheduler(pool),
            )
            .unwrap();

        for i in 1..=8u32 {
            ch.send(i);
        }

        let err = err_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(
            matches!(&err, ReactorError::Handler(e) if e.to_string().contains("sentinel handler failure"))
        );
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));

        assert_eq!(*sink.lock().unwrap(), [1, 2, 3, 4]);
        let log = sys_log.lock().unwrap();
        assert_eq!(log.iter().filter(|t| **t == "died").count(), 1);
        let died = log.iter().position(|t| *t == "died").expect("died not seen");
        let terminated = log
            .iter()
            .position(|t| *t == "terminated")
            .expect("terminated not seen");
        assert!(died < terminated);
    }

    #[test]
    fn constructor_error_skips_started_and_unregisters() {
        let (err_tx, err_rx) = channel::unbounded::<ReactorError>();
        let hook: FailureHook = Arc::new(move |err: &ReactorError| {
            err_tx.send(err.clone()).ok();
        });
        let pool = ThreadPool::with_options(1, false, Some(hook));

        let system = ReactorSystem::new("sys-e", SystemConfig::default());
        let started = Arc::new(AtomicBool::new(false));

        let ch = system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let started = started.clone();
                    move |scope| {
                        let started = started.clone();
                        scope.system_events().subscribe(move |ev| {
                            if matches!(ev, SysEvent::Started) {
                                started.store(true, Ordering::SeqCst);
                            }
                        });
                        Err(anyhow!("boot failure"))
                    }
                })
                .with_scheduler(pool),
            )
            .unwrap();

        let err = err_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(&err, ReactorError::Ctor(e) if e.to_string().contains("boot failure")));
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));
        assert!(!started.load(Ordering::SeqCst));
        assert!(!ch.send(1));
    }

    #[test]
    fn daemon_only_reactor_terminates_after_processing() {
        let system = ReactorSystem::new("sys-f", SystemConfig::default());
        let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let (aux_tx, aux_rx) = channel::bounded::<Channel<u8>>(1);
        let (scope_tx, scope_rx) = channel::bounded::<ReactorScope<u8>>(1);

        system
            .spawn(Proto::<Probe<u8>>::from_fn({
                let sink = sink.clone();
                move |scope| {
                    let aux = scope.open_connector::<u8>(Some("ticks"), QueueKind::Unbounded, true)?;
                    let sink = sink.clone();
                    aux.events()
                        .subscribe(move |ev| sink.lock().unwrap().push(*ev));
                    aux_tx.send(aux.channel()).ok();
                    scope_tx.send(scope.clone()).ok();
                    Ok(Probe(PhantomData))
                }
            }))
            .unwrap();

        let aux = aux_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let scope = scope_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(aux.send(7));
        assert!(wait_until(Duration::from_secs(2), || sink.lock().unwrap().len() == 1));
        assert_eq!(system.reactor_count(), 1);

        // Daemon connectors alone do not keep the reactor alive: sealing
        // the only non-daemon connector brings it down at the next batch.
        scope.main().seal();
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));
        assert!(!aux.is_open());
        assert!(!aux.send(8));
        assert_eq!(*sink.lock().unwrap(), [7]);
    }

    // ---- lifecycle and registry edges

    #[test]
    fn seal_is_idempotent() {
        let system = ReactorSystem::new("sys-seal", SystemConfig::default());
        let (scope_tx, scope_rx) = channel::bounded::<ReactorScope<u32>>(1);
        system
            .spawn(Proto::<Probe<u32>>::from_fn(move |scope| {
                scope_tx.send(scope.clone()).ok();
                Ok(Probe(PhantomData))
            }))
            .unwrap();
        let scope = scope_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let uid = scope.main().uid();
        assert!(scope.seal(uid));
        assert!(!scope.seal(uid));
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));
        assert!(!scope.seal(uid));
    }

    #[test]
    fn duplicate_reactor_name_is_rejected() {
        let system = ReactorSystem::new("sys-twin", SystemConfig::default());
        system
            .spawn(Proto::<Probe<u32>>::new().with_name("twin"))
            .unwrap();
        let err = system
            .spawn(Proto::<Probe<u32>>::new().with_name("twin"))
            .unwrap_err();
        assert!(matches!(err, ReactorError::DuplicateName(_)));
        system.shutdown();
    }

    #[test]
    fn duplicate_connector_name_is_rejected() {
        let system = ReactorSystem::new("sys-dupchan", SystemConfig::default());
        let (res_tx, res_rx) = channel::bounded::<bool>(1);
        system
            .spawn(Proto::<Probe<u32>>::from_fn(move |scope| {
                let _a = scope.open_connector::<u8>(Some("dup"), QueueKind::Unbounded, true)?;
                let b = scope.open_connector::<u8>(Some("dup"), QueueKind::Unbounded, true);
                res_tx
                    .send(matches!(b, Err(ReactorError::DuplicateName(_))))
                    .ok();
                Ok(Probe(PhantomData))
            }))
            .unwrap();
        assert!(res_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        system.shutdown();
    }

    #[test]
    fn channels_are_found_by_path() {
        let system = ReactorSystem::new("sys-find", SystemConfig::default());
        let sink = Arc::new(Mutex::new(Vec::<u32>::new()));
        let (ready_tx, ready_rx) = channel::bounded::<()>(1);
        system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let sink = sink.clone();
                    move |scope| {
                        let aux =
                            scope.open_connector::<u32>(Some("side"), QueueKind::Unbounded, true)?;
                        let sink = sink.clone();
                        aux.events()
                            .subscribe(move |ev| sink.lock().unwrap().push(*ev));
                        ready_tx.send(()).ok();
                        Ok(Probe(PhantomData))
                    }
                })
                .with_name("lookup"),
            )
            .unwrap();
        ready_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(system.find_channel::<u32>("lookup").is_some());
        assert!(system.find_channel::<u32>("lookup#side").is_some());
        assert!(system.find_channel::<i64>("lookup#side").is_none());
        assert!(system.find_channel::<u32>("missing").is_none());

        let side = system.find_channel::<u32>("lookup#side").unwrap();
        side.send(9);
        assert!(wait_until(Duration::from_secs(2), || {
            *sink.lock().unwrap() == [9]
        }));
        system.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_blocking() {
        let system = ReactorSystem::new("sys-down", SystemConfig::default());
        let sys_log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        system
            .spawn(Proto::<Probe<u32>>::from_fn({
                let sys_log = sys_log.clone();
                move |scope| {
                    let sys_log = sys_log.clone();
                    scope.system_events().subscribe(move |ev| {
                        sys_log.lock().unwrap().push(sys_tag(ev));
                    });
                    Ok(Probe(PhantomData))
                }
            }))
            .unwrap();

        system.shutdown();
        assert_eq!(system.reactor_count(), 0);
        system.shutdown();

        let log = sys_log.lock().unwrap();
        assert!(log.contains(&"shutdown"));
        assert!(log.contains(&"terminated"));

        assert!(matches!(
            system.spawn(Proto::<Probe<u32>>::new()),
            Err(ReactorError::Terminated(_))
        ));
    }

    // ---- scheduler policies

    #[test]
    fn dedicated_thread_policy_runs_and_terminates() {
        let system = ReactorSystem::new("sys-nt", SystemConfig::default());
        let sink = Arc::new(Mutex::new(Vec::<u32>::new()));
        let ch = system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let sink = sink.clone();
                    move |scope| {
                        let main = scope.main().clone();
                        let sink = sink.clone();
                        scope.main().events().subscribe(move |ev| {
                            sink.lock().unwrap().push(*ev);
                            if *ev == 3 {
                                main.seal();
                            }
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_scheduler_name("new-thread"),
            )
            .unwrap();

        for i in 1..=3u32 {
            ch.send(i);
        }
        assert!(wait_until(Duration::from_secs(2), || system.reactor_count() == 0));
        assert_eq!(*sink.lock().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn piggyback_runs_on_caller_thread() {
        let system = ReactorSystem::new("sys-pb", SystemConfig::default());
        let init_thread = Arc::new(Mutex::new(None::<thread::ThreadId>));
        let handler_thread = Arc::new(Mutex::new(None::<thread::ThreadId>));

        let ch = system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let init_thread = init_thread.clone();
                    let handler_thread = handler_thread.clone();
                    move |scope| {
                        *init_thread.lock().unwrap() = Some(thread::current().id());
                        let handler_thread = handler_thread.clone();
                        let main = scope.main().clone();
                        scope.main().events().subscribe(move |_| {
                            *handler_thread.lock().unwrap() = Some(thread::current().id());
                            main.seal();
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_scheduler_name("piggyback"),
            )
            .unwrap();

        // The first batch ran inline during spawn.
        assert_eq!(*init_thread.lock().unwrap(), Some(thread::current().id()));

        ch.send(1);
        assert_eq!(*handler_thread.lock().unwrap(), Some(thread::current().id()));
        assert_eq!(system.reactor_count(), 0);
    }

    #[test]
    fn timer_policy_reschedules_periodically() {
        let system = ReactorSystem::new("sys-timer", SystemConfig::default());
        system.register_scheduler("timer-20", Arc::new(Timer::new(20)));

        let batches = Arc::new(AtomicU64::new(0));
        system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let batches = batches.clone();
                    move |scope| {
                        let batches = batches.clone();
                        scope.system_events().subscribe(move |ev| {
                            if matches!(ev, SysEvent::Scheduled) {
                                batches.fetch_add(1, Ordering::SeqCst);
                            }
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_scheduler_name("timer-20"),
            )
            .unwrap();

        // Batches keep coming without any events being sent.
        assert!(wait_until(Duration::from_secs(3), || {
            batches.load(Ordering::SeqCst) >= 3
        }));
        system.shutdown();
        assert_eq!(system.reactor_count(), 0);
    }

    #[test]
    fn unknown_scheduler_name_fails_spawn() {
        let system = ReactorSystem::new("sys-nosched", SystemConfig::default());
        let err = system
            .spawn(Proto::<Probe<u32>>::new().with_scheduler_name("nope"))
            .unwrap_err();
        assert!(matches!(err, ReactorError::UnknownScheduler(_)));
    }

    // ---- fairness

    #[test]
    fn batch_budget_bounds_events_per_batch() {
        let system = ReactorSystem::new("sys-budget", SystemConfig::default());
        let (scope_tx, scope_rx) = channel::bounded::<ReactorScope<u32>>(1);
        let seen = Arc::new(AtomicU64::new(0));

        let ch = system
            .spawn(
                Proto::<Probe<u32>>::from_fn({
                    let seen = seen.clone();
                    move |scope| {
                        scope_tx.send(scope.clone()).ok();
                        let seen = seen.clone();
                        scope.main().events().subscribe(move |_| {
                            seen.fetch_add(1, Ordering::SeqCst);
                        });
                        Ok(Probe(PhantomData))
                    }
                })
                .with_event_budget(10),
            )
            .unwrap();
        let scope = scope_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        for i in 0..95u32 {
            ch.send(i);
        }
        assert!(wait_until(Duration::from_secs(2), || {
            seen.load(Ordering::SeqCst) == 95
        }));

        // 95 events over a 10-event budget takes at least 10 dispatch batches.
        let stats = scope.frame().stats();
        assert_eq!(stats.budget(), 10);
        assert_eq!(stats.total_events(), 95);
        assert!(stats.total_batches() >= 10);
        system.shutdown();
    }
}
