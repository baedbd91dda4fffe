#[cfg(test)]
mod tests {
    use dynpool::{
        model::ShutdownPolicy,
        pool::{Config, ThreadPool},
    };
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<T>(name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn load_test_1_scale_up_then_down() {
        println!("\n=== LOAD TEST 1: Scaling trajectory (min=2, max=4, capacity=5) ===");
        let config = Config {
            min_workers: 2,
            max_workers: 4,
            queue_capacity: 5,
            scale_interval: Duration::from_millis(50),
            scale_step: 2,
            shutdown_policy: ShutdownPolicy::Discard,
            thread_name: "scale-pool".into(),
        };
        let pool = ThreadPool::with_config(config).unwrap();

        let peak_live = AtomicUsize::new(0);
        let stop_sampling = AtomicBool::new(false);
        thread::scope(|s| {
            // Sampler: the documented invariants must hold at every
            // observation point while the pool is running.
            s.spawn(|| {
                while !stop_sampling.load(Ordering::SeqCst) {
                    let live = pool.live_count();
                    assert!((2..=4).contains(&live), "live count out of bounds: {live}");
                    assert!(pool.queue_len() <= 5);
                    assert!(pool.busy_count() <= 4);
                    peak_live.fetch_max(live, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                }
            });

            measure("submit 10 slow tasks", || {
                for _ in 0..10 {
                    pool.submit(|| thread::sleep(Duration::from_millis(300)))
                        .unwrap();
                }
            });

            assert!(
                wait_until(Duration::from_secs(15), || pool.metrics().completed == 10),
                "slow tasks did not finish"
            );
            // Sustained idleness (busy*2 < live) must shrink back to min.
            assert!(
                wait_until(Duration::from_secs(10), || pool.live_count() == 2),
                "pool did not shrink back to min"
            );
            stop_sampling.store(true, Ordering::SeqCst);
        });

        assert_eq!(
            peak_live.load(Ordering::SeqCst),
            4,
            "backlog should drive live to max"
        );
        pool.shutdown();
        println!(
            "  Peak live: {}, final live: 0",
            peak_live.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn load_test_2_exact_execution_count() {
        println!("\n=== LOAD TEST 2: 4 producers x 250 tasks, exactly-once execution ===");
        let config = Config {
            min_workers: 2,
            max_workers: 8,
            queue_capacity: 16,
            scale_interval: Duration::from_millis(20),
            scale_step: 2,
            shutdown_policy: ShutdownPolicy::Discard,
            thread_name: "stress-pool".into(),
        };
        let pool = ThreadPool::with_config(config).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));

        measure("1000 tasks through 4 producers", || {
            thread::scope(|s| {
                for _ in 0..4 {
                    let executed = Arc::clone(&executed);
                    let pool = &pool;
                    s.spawn(move || {
                        for _ in 0..250 {
                            let executed = Arc::clone(&executed);
                            pool.submit(move || {
                                executed.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                        }
                    });
                }
            });
            assert!(wait_until(Duration::from_secs(30), || {
                executed.load(Ordering::SeqCst) == 1000
            }));
        });

        pool.shutdown();
        let metrics = pool.metrics();
        assert_eq!(executed.load(Ordering::SeqCst), 1000);
        assert_eq!(metrics.submitted, 1000);
        assert_eq!(metrics.completed, 1000);
        assert_eq!(metrics.panicked, 0);
        assert_eq!(metrics.discarded, 0);
        println!("  No lost and no duplicate executions");
    }

    #[test]
    fn load_test_3_panic_storm() {
        println!("\n=== LOAD TEST 3: 300 tasks, every 10th panics ===");
        std::panic::set_hook(Box::new(|_| {}));

        let config = Config {
            min_workers: 2,
            max_workers: 4,
            queue_capacity: 32,
            scale_interval: Duration::from_millis(20),
            scale_step: 2,
            shutdown_policy: ShutdownPolicy::Discard,
            thread_name: "panic-pool".into(),
        };
        let pool = ThreadPool::with_config(config).unwrap();

        for i in 0..300usize {
            pool.submit(move || {
                if i % 10 == 0 {
                    panic!("intentional panic at {i}");
                }
            })
            .unwrap();
        }

        assert!(wait_until(Duration::from_secs(30), || {
            let m = pool.metrics();
            m.completed + m.panicked == 300
        }));
        let metrics = pool.metrics();
        assert_eq!(metrics.completed, 270);
        assert_eq!(metrics.panicked, 30);
        assert_eq!(pool.busy_count(), 0, "panics must not leak busy accounting");

        // The pool still serves after the storm.
        let survived = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&survived);
        pool.submit(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            survived.load(Ordering::SeqCst)
        }));

        pool.shutdown();
        let _ = std::panic::take_hook();
        println!(
            "  Completed: {}, panicked: {}, success rate: {:.1}%",
            metrics.completed,
            metrics.panicked,
            metrics.success_rate() * 100.0
        );
    }

    #[test]
    fn load_test_4_throughput_smoke() {
        println!("\n=== LOAD TEST 4: 10k trivial tasks ===");
        let mut config = Config::cpu_bound();
        config.queue_capacity = 1024;
        config.thread_name = "throughput-pool".into();
        let pool = ThreadPool::with_config(config).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));

        let start = Instant::now();
        for _ in 0..10_000 {
            let executed = Arc::clone(&executed);
            pool.submit(move || {
                executed.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        assert!(wait_until(Duration::from_secs(60), || {
            executed.load(Ordering::Relaxed) == 10_000
        }));
        let elapsed = start.elapsed();

        pool.shutdown();
        println!(
            "  Throughput: {:.0} tasks/sec",
            10_000.0 / elapsed.as_secs_f64()
        );
    }
}
