//! # Integration Tests
//!
//! Cross-crate tests.
//!
//! Covers:
//! - Dispatcher lifecycle scenarios (callback counts, concurrency cap, ordering)
//! - Config file -> dispatcher wiring
//! - CLI runner end to end (unix only, real processes)

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::JobEvent::Start.as_str(), "start");
    }
}

#[cfg(test)]
mod dispatcher_scenarios {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use dispatcher::{
        Callback, Dispatcher, DispatcherBuilder, DispatcherState, IterSource, JobSource,
    };
    use tokio::sync::mpsc;

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    /// capacity 10, 10 jobs, 1 Start + 2 End (one registered late)
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_callback_counts_with_late_registration() {
        let runs = counter();
        let starts = counter();
        let ends = counter();

        let runs_job = runs.clone();
        let starts_cb = starts.clone();
        let ends_cb = ends.clone();
        let pool = Dispatcher::new(
            10,
            move |_: u32| {
                let runs = runs_job.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            [
                Callback::on_start(move || {
                    starts_cb.fetch_add(1, Ordering::SeqCst);
                }),
                Callback::on_end({
                    let ends = ends_cb.clone();
                    move || {
                        ends.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            ],
        )
        .unwrap();

        pool.register_callback(Callback::on_end(move || {
            ends_cb.fetch_add(1, Ordering::SeqCst);
        }));

        let intake = pool.spawn(IterSource::new(0..10u32));
        pool.wait().await;
        intake.await.unwrap().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 10);
        assert_eq!(starts.load(Ordering::SeqCst), 10);
        assert_eq!(ends.load(Ordering::SeqCst), 20);
        assert_eq!(pool.state(), DispatcherState::Done);
    }

    /// capacity 2, 5 jobs sleeping 50ms: sampled concurrency never above 2
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_capacity() {
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let (cur, max) = (current.clone(), max_seen.clone());
        let pool = DispatcherBuilder::new(2)
            .build(move |_: u32| {
                let (cur, max) = (cur.clone(), max.clone());
                async move {
                    let now = cur.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    cur.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let sampler_pool = pool.clone();
        let sampler = tokio::spawn(async move {
            let mut samples = Vec::new();
            while sampler_pool.state() != DispatcherState::Done {
                samples.push(sampler_pool.in_flight());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            samples
        });

        let intake = pool.spawn(IterSource::new(0..5u32));
        pool.wait().await;
        intake.await.unwrap().unwrap();

        let samples = sampler.await.unwrap();
        assert!(samples.iter().all(|&n| n <= 2), "samples: {samples:?}");
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.metrics().peak_in_flight, 2);
        assert_eq!(pool.completed(), 5);
    }

    /// Channel source that records every input as the dispatcher takes it
    struct RecordingSource {
        rx: mpsc::Receiver<&'static str>,
        consumed: Arc<Mutex<Vec<&'static str>>>,
    }

    impl JobSource<&'static str> for RecordingSource {
        async fn next_input(&mut self) -> Option<&'static str> {
            let input = self.rx.recv().await?;
            self.consumed.lock().unwrap().push(input);
            Some(input)
        }
    }

    /// capacity 1, 3 jobs: Start order follows submission order
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_order_matches_submission() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let consumed = Arc::new(Mutex::new(Vec::new()));
        let start_order = Arc::new(Mutex::new(Vec::new()));

        let log_job = log.clone();
        let pool = DispatcherBuilder::new(1)
            .build(move |input: &'static str| {
                let log = log_job.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    log.lock().unwrap().push(input);
                }
            })
            .unwrap();

        // Start fires on the intake task, so the latest consumed input is the one starting.
        let (starts, seen) = (start_order.clone(), consumed.clone());
        pool.register_callback(Callback::on_start(move || {
            let current = *seen.lock().unwrap().last().expect("Start before any input");
            starts.lock().unwrap().push(current);
        }));

        let (tx, rx) = mpsc::channel(4);
        let intake = pool.spawn(RecordingSource {
            rx,
            consumed: consumed.clone(),
        });
        let submitted = ["a", "b", "c"];
        for input in submitted {
            tx.send(input).await.unwrap();
        }
        drop(tx);

        pool.wait().await;
        intake.await.unwrap().unwrap();

        assert_eq!(*start_order.lock().unwrap(), submitted);
        assert_eq!(*consumed.lock().unwrap(), submitted);
        let mut entries = log.lock().unwrap().clone();
        entries.sort_unstable();
        assert_eq!(entries, submitted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_k_end_callbacks_fire_k_times_n() {
        const K: u64 = 3;
        const N: u32 = 25;

        let ends = counter();
        let pool = DispatcherBuilder::new(4)
            .build(|_: u32| async {})
            .unwrap();
        for _ in 0..K {
            let ends = ends.clone();
            pool.register_callback(Callback::on_end(move || {
                ends.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let intake = pool.spawn(IterSource::new(0..N));
        pool.wait().await;
        intake.await.unwrap().unwrap();

        assert_eq!(ends.load(Ordering::SeqCst), K * N as u64);
        assert_eq!(pool.submitted(), N as u64);
        assert_eq!(pool.completed(), N as u64);
    }

    #[tokio::test]
    async fn test_empty_source_resolves_immediately() {
        let pool = DispatcherBuilder::new(2)
            .build(|_: u32| async {})
            .unwrap();

        pool.work(IterSource::new(Vec::<u32>::new())).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), pool.wait())
            .await
            .expect("wait should resolve for an empty source");
        assert_eq!(pool.submitted(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blueprint_drives_dispatcher() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            "[pool]\nname = \"scenario\"\ncapacity = 3\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let pool = DispatcherBuilder::from_section(&blueprint.pool)
            .build_blocking(|n: u64| {
                std::thread::sleep(Duration::from_millis(5 * (n % 3)));
            })
            .unwrap();
        assert_eq!(pool.name(), "scenario");
        assert_eq!(pool.capacity(), 3);

        pool.work(IterSource::new(0..12u64)).await.unwrap();
        pool.wait().await;

        let snapshot = pool.metrics();
        assert_eq!(snapshot.completed, 12);
        assert!(snapshot.peak_in_flight <= 3);
        observability::record_dispatcher_snapshot(pool.name(), &snapshot);
    }
}

#[cfg(all(test, unix))]
mod cli_e2e_tests {
    use std::io::Write;

    use clap::Parser;
    use jobpool_cli::cli::{Cli, Commands, RunArgs};
    use jobpool_cli::runner::InputSpec;
    use jobpool_cli::settings::{apply_run_overrides, load_blueprint};
    use jobpool_cli::{Runner, RunnerConfig};

    fn parse_run(args: &[&str]) -> RunArgs {
        match Cli::parse_from(args).command {
            Commands::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_config_file_and_input_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();

        let config_path = dir.path().join("pool.toml");
        std::fs::write(
            &config_path,
            "[pool]\nname = \"e2e\"\ncapacity = 2\ninput_buffer = 2\n\n\
             [command]\nprogram = \"sh\"\nargs = [\"-c\", \"test -n \\\"$0\\\"\", \"{}\"]\n",
        )
        .unwrap();

        let input_path = dir.path().join("inputs.txt");
        let mut input = std::fs::File::create(&input_path).unwrap();
        for i in 0..6 {
            writeln!(input, "item-{i}").unwrap();
        }
        drop(input);

        let config_arg = config_path.to_str().unwrap();
        let input_arg = input_path.to_str().unwrap();
        let args = parse_run(&["jobpool", "run", "-c", config_arg, "-i", input_arg]);

        let mut blueprint = load_blueprint(args.config.as_deref()).unwrap();
        apply_run_overrides(&mut blueprint, &args).unwrap();

        let reader = InputSpec::from_arg(args.input.as_deref())
            .open()
            .await
            .unwrap();
        let summary = Runner::new(RunnerConfig {
            blueprint,
            quiet_commands: true,
        })
        .run(reader, std::future::pending())
        .await
        .unwrap();

        assert_eq!(summary.submitted, 6);
        assert_eq!(summary.completed, 6);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.failed, 0);
        assert!(summary.peak_in_flight <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fail_fast_stops_new_inputs() {
        let args = parse_run(&["jobpool", "run", "-j", "1", "--fail-fast", "--", "false"]);
        let mut blueprint = load_blueprint(None).unwrap();
        apply_run_overrides(&mut blueprint, &args).unwrap();
        blueprint.pool.input_buffer = 1;

        let mut lines = String::new();
        for i in 0..200 {
            lines.push_str(&format!("{i}\n"));
        }
        let reader = std::io::Cursor::new(lines.into_bytes());

        let summary = Runner::new(RunnerConfig {
            blueprint,
            quiet_commands: true,
        })
        .run(reader, std::future::pending())
        .await
        .unwrap();

        assert!(summary.failed >= 1);
        assert!(summary.submitted < 200, "submitted {}", summary.submitted);
        assert_eq!(summary.submitted, summary.completed);
    }
}
