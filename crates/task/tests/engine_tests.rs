use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskweave_core::{EngineEvent, RunEvent, TaskEvent};
use taskweave_task::{
    Error, ExecutionEngine, ExecutionMode, ExecutionResult, RunConfig, Task, TaskStatus,
};

fn config(mode: ExecutionMode) -> RunConfig {
    RunConfig::with_mode(mode)
        .max_workers(4)
        .retry_base_delay(Duration::from_millis(1))
        .global_timeout(Duration::from_secs(30))
        .test_timeout(Duration::from_secs(10))
}

fn passing(id: &str, deps: &[&str]) -> Task {
    Task::builder(id)
        .dependencies(deps.iter().copied())
        .execute(|_ctx| async { Ok(()) })
        .build()
}

fn failing(id: &str, deps: &[&str]) -> Task {
    Task::builder(id)
        .dependencies(deps.iter().copied())
        .execute(|ctx| async move { anyhow::bail!("{} exploded", ctx.task_id()) })
        .build()
}

fn counting(id: &str, deps: &[&str], calls: Arc<AtomicU32>) -> Task {
    Task::builder(id)
        .dependencies(deps.iter().copied())
        .execute(move |_ctx| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
}

/// Fails the first `failures` calls, then passes
fn flaky(id: &str, failures: u32, retries: u32, calls: Arc<AtomicU32>) -> Task {
    Task::builder(id)
        .max_retries(retries)
        .execute(move |_ctx| {
            let calls = Arc::clone(&calls);
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < failures {
                    anyhow::bail!("transient failure {call}");
                }
                Ok(())
            }
        })
        .build()
}

fn result<'a>(results: &'a [ExecutionResult], id: &str) -> &'a ExecutionResult {
    results
        .iter()
        .find(|r| r.task_id == id)
        .unwrap_or_else(|| panic!("no result for {id}"))
}

async fn wait_for_status(engine: &ExecutionEngine, id: &str, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.status_of(id) != Some(status) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("task never reached the expected status");
}

#[tokio::test]
async fn test_dependents_start_after_their_dependency() {
    let tasks = vec![passing("a", &[]), passing("b", &["a"]), passing("c", &["a"])];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Parallel).max_workers(2)).unwrap();

    let results = engine.run().await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(ExecutionResult::is_passed));

    let a = result(&results, "a");
    assert!(a.end_time <= result(&results, "b").start_time);
    assert!(a.end_time <= result(&results, "c").start_time);
}

#[tokio::test]
async fn test_failed_dependency_skips_dependents_in_every_mode() {
    for mode in [
        ExecutionMode::Sequential,
        ExecutionMode::Parallel,
        ExecutionMode::Comprehensive,
    ] {
        let b_calls = Arc::new(AtomicU32::new(0));
        let c_calls = Arc::new(AtomicU32::new(0));
        let tasks = vec![
            failing("a", &[]),
            counting("b", &["a"], Arc::clone(&b_calls)),
            counting("c", &["b"], Arc::clone(&c_calls)),
            passing("d", &[]),
        ];
        let engine = ExecutionEngine::new(tasks, config(mode)).unwrap();

        let results = engine.run().await.unwrap();
        assert_eq!(results.len(), 4, "mode {mode}");

        assert_eq!(result(&results, "a").status, TaskStatus::Failed);
        for id in ["b", "c"] {
            let skipped = result(&results, id);
            assert_eq!(skipped.status, TaskStatus::Skipped, "mode {mode}");
            assert!(skipped
                .skip_reason
                .as_deref()
                .is_some_and(|reason| reason.contains("dependencies failed")));
        }
        assert_eq!(result(&results, "d").status, TaskStatus::Passed);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);

        let metrics = engine.metrics();
        assert_eq!((metrics.passed, metrics.failed, metrics.skipped), (1, 1, 2));
    }
}

#[tokio::test]
async fn test_retry_until_success_counts_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ExecutionEngine::new(
        vec![flaky("flaky", 2, 2, Arc::clone(&calls))],
        config(ExecutionMode::Parallel),
    )
    .unwrap();

    let results = engine.run().await.unwrap();
    let flaky = result(&results, "flaky");
    assert_eq!(flaky.status, TaskStatus::Passed);
    assert_eq!(flaky.retry_count, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(engine.metrics().retries, 2);
}

#[tokio::test]
async fn test_disabled_retries_allow_a_single_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ExecutionEngine::new(
        vec![flaky("flaky", 2, 2, Arc::clone(&calls))],
        config(ExecutionMode::Sequential).enable_retry(false),
    )
    .unwrap();

    let results = engine.run().await.unwrap();
    let flaky = result(&results, "flaky");
    assert_eq!(flaky.status, TaskStatus::Failed);
    assert_eq!(flaky.retry_count, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        flaky.error_message.as_deref(),
        Some("execute failed: transient failure 0")
    );
    assert_eq!(engine.metrics().retries, 0);
}

#[tokio::test]
async fn test_exhausted_retries_keep_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ExecutionEngine::new(
        vec![flaky("flaky", 5, 2, Arc::clone(&calls))],
        config(ExecutionMode::Sequential),
    )
    .unwrap();

    let results = engine.run().await.unwrap();
    let flaky = result(&results, "flaky");
    assert_eq!(flaky.status, TaskStatus::Failed);
    assert_eq!(flaky.retry_count, 2);
    assert_eq!(
        flaky.error_message.as_deref(),
        Some("execute failed: transient failure 2")
    );
}

#[tokio::test]
async fn test_metrics_are_stable_after_run() {
    let tasks = vec![
        passing("a", &[]),
        failing("b", &[]),
        passing("c", &["b"]),
        passing("d", &["a"]),
    ];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Comprehensive)).unwrap();
    engine.run().await.unwrap();

    let first = engine.metrics();
    let second = engine.metrics();
    assert_eq!(first, second);
    assert_eq!(first.total, 4);
    assert_eq!(first.finished(), 4);
    assert!(!first.is_success());
    assert_eq!(
        first.to_string(),
        "Tests: 4 total, 2 passed, 1 failed, 1 skipped (retries: 0)"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_pool_bounds_concurrency() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..12)
        .map(|i| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            Task::builder(format!("t{i}"))
                .execute(move |_ctx| {
                    let active = Arc::clone(&active);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(15)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .build()
        })
        .collect();

    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Parallel).max_workers(3)).unwrap();
    let results = engine.run().await.unwrap();

    assert_eq!(results.len(), 12);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak}");
    assert!(peak >= 1);
}

#[tokio::test]
async fn test_out_of_range_workers_are_clamped() {
    let engine =
        ExecutionEngine::new(vec![passing("a", &[])], config(ExecutionMode::Parallel).max_workers(0))
            .unwrap();
    assert_eq!(engine.config().max_workers, 1);

    let engine = ExecutionEngine::new(
        vec![passing("a", &[])],
        config(ExecutionMode::Parallel).max_workers(500),
    )
    .unwrap();
    assert_eq!(engine.config().max_workers, 100);
    assert_eq!(engine.run().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_global_timeout_interrupts_long_task() {
    for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
        let tasks = vec![
            Task::builder("slow")
                .execute(|_ctx| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                })
                .build(),
            passing("after", &["slow"]),
        ];
        let engine = ExecutionEngine::new(
            tasks,
            config(mode).global_timeout(Duration::from_millis(100)),
        )
        .unwrap();

        let started = Instant::now();
        let results = engine.run().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3), "mode {mode}");

        let slow = result(&results, "slow");
        assert_ne!(slow.status, TaskStatus::Passed);
        assert!(slow.error.as_deref().is_some_and(Error::is_cancellation));
        assert_eq!(result(&results, "after").status, TaskStatus::Skipped);
    }
}

#[tokio::test]
async fn test_task_timeout_fails_each_attempt() {
    let tasks = vec![Task::builder("stuck")
        .timeout(Duration::from_millis(20))
        .max_retries(1)
        .execute(|ctx| async move {
            ctx.cancelled().await;
            anyhow::bail!("gave up")
        })
        .build()];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Sequential)).unwrap();

    let results = engine.run().await.unwrap();
    let stuck = result(&results, "stuck");
    assert_eq!(stuck.status, TaskStatus::Failed);
    assert_eq!(stuck.retry_count, 1);
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let c_calls = Arc::new(AtomicU32::new(0));
    let tasks = vec![
        passing("a", &[]),
        failing("b", &["a"]),
        counting("c", &["a"], Arc::clone(&c_calls)),
    ];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::FailFast)).unwrap();

    let err = engine.run().await.unwrap_err();
    match err {
        Error::FailFast { task_id, message } => {
            assert_eq!(task_id, "b");
            assert!(message.contains("b exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.results().len(), 2);
}

#[tokio::test]
async fn test_lifecycle_hooks_run_in_order() {
    let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let (setup_log, execute_log, teardown_log) =
        (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));

    let task = Task::builder("db")
        .setup(move |_ctx| {
            let log = Arc::clone(&setup_log);
            async move {
                log.lock().push("setup");
                Ok(())
            }
        })
        .execute(move |_ctx| {
            let log = Arc::clone(&execute_log);
            async move {
                log.lock().push("execute");
                anyhow::bail!("query failed")
            }
        })
        .teardown(move |_ctx| {
            let log = Arc::clone(&teardown_log);
            async move {
                log.lock().push("teardown");
                Ok(())
            }
        })
        .build();

    let engine = ExecutionEngine::new(vec![task], config(ExecutionMode::Sequential)).unwrap();
    let results = engine.run().await.unwrap();

    assert_eq!(result(&results, "db").status, TaskStatus::Failed);
    assert_eq!(*log.lock(), vec!["setup", "execute", "teardown"]);
}

#[tokio::test]
async fn test_teardown_error_does_not_fail_task() {
    let task = Task::builder("a")
        .execute(|_ctx| async { Ok(()) })
        .teardown(|_ctx| async { anyhow::bail!("cleanup failed") })
        .build();
    let engine = ExecutionEngine::new(vec![task], config(ExecutionMode::Parallel)).unwrap();

    let results = engine.run().await.unwrap();
    assert_eq!(result(&results, "a").status, TaskStatus::Passed);
}

#[tokio::test]
async fn test_setup_failure_skips_execute_and_teardown() {
    let calls = Arc::new(AtomicU32::new(0));
    let (execute_calls, teardown_calls) = (Arc::clone(&calls), Arc::clone(&calls));
    let task = Task::builder("a")
        .setup(|_ctx| async { anyhow::bail!("no database") })
        .execute(move |_ctx| {
            let calls = Arc::clone(&execute_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .teardown(move |_ctx| {
            let calls = Arc::clone(&teardown_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build();
    let engine = ExecutionEngine::new(vec![task], config(ExecutionMode::Sequential)).unwrap();

    let results = engine.run().await.unwrap();
    let a = result(&results, "a");
    assert_eq!(a.status, TaskStatus::Failed);
    assert_eq!(a.error_message.as_deref(), Some("setup failed: no database"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_execute_fails_at_run_time() {
    let engine = ExecutionEngine::new(
        vec![Task::builder("empty").build()],
        config(ExecutionMode::Parallel),
    )
    .unwrap();

    let results = engine.run().await.unwrap();
    let empty = result(&results, "empty");
    assert_eq!(empty.status, TaskStatus::Failed);
    assert!(matches!(
        empty.error.as_deref(),
        Some(Error::MissingExecute { .. })
    ));
}

#[tokio::test]
async fn test_panicking_execute_becomes_failure() {
    let task = Task::builder("boom")
        .execute(|_ctx| async {
            let state: Option<u32> = None;
            state.expect("unexpected state");
            Ok(())
        })
        .build();
    let engine = ExecutionEngine::new(vec![task, passing("other", &[])], config(ExecutionMode::Parallel))
        .unwrap();

    let results = engine.run().await.unwrap();
    let boom = result(&results, "boom");
    assert_eq!(boom.status, TaskStatus::Failed);
    assert!(boom
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("unexpected state")));
    assert_eq!(result(&results, "other").status, TaskStatus::Passed);
}

#[test]
fn test_construction_errors() {
    let err = ExecutionEngine::new(Vec::new(), RunConfig::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyTaskSet));

    let err = ExecutionEngine::new(
        vec![passing("a", &["b"]), passing("b", &["a"])],
        RunConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::CircularDependency { .. }));

    let err = ExecutionEngine::with_mode_name(vec![passing("a", &[])], "turbo", RunConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownExecutionMode { mode } if mode == "turbo"));

    let engine =
        ExecutionEngine::with_mode_name(vec![passing("a", &[])], "fail-fast", RunConfig::default())
            .unwrap();
    assert_eq!(engine.config().mode, ExecutionMode::FailFast);
}

#[tokio::test]
async fn test_engine_runs_only_once() {
    let engine = ExecutionEngine::new(vec![passing("a", &[])], config(ExecutionMode::Sequential)).unwrap();
    engine.run().await.unwrap();
    assert!(matches!(engine.run().await, Err(Error::AlreadyRan)));
    assert_eq!(engine.results().len(), 1);
}

#[tokio::test]
async fn test_stop_cancels_in_flight_run() {
    let tasks = vec![
        Task::builder("slow")
            .execute(|_ctx| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .build(),
        passing("later", &["slow"]),
    ];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Parallel)).unwrap();

    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    wait_for_status(&engine, "slow", TaskStatus::Running).await;
    assert!(engine.is_running());

    engine.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!engine.is_running());

    let results = handle.await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(result(&results, "slow").status, TaskStatus::Failed);
    let later = result(&results, "later");
    assert_eq!(later.status, TaskStatus::Skipped);
}

#[tokio::test]
async fn test_stop_reports_shutdown_timeout() {
    let task = Task::builder("sticky")
        .execute(|_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .teardown(|_ctx| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        })
        .build();
    let engine = ExecutionEngine::new(vec![task], config(ExecutionMode::Sequential)).unwrap();

    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    wait_for_status(&engine, "sticky", TaskStatus::Running).await;

    let err = engine.stop(Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, Error::ShutdownTimeout { .. }));

    let results = handle.await.unwrap().unwrap();
    assert_eq!(result(&results, "sticky").status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_stop_without_run_returns_immediately() {
    let engine = ExecutionEngine::new(vec![passing("a", &[])], config(ExecutionMode::Parallel)).unwrap();
    engine.stop(Duration::from_millis(10)).await.unwrap();

    let results = engine.run().await.unwrap();
    let a = result(&results, "a");
    assert_eq!(a.status, TaskStatus::Skipped);
    assert_eq!(a.skip_reason.as_deref(), Some("context canceled"));
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let engine = ExecutionEngine::new(
        vec![passing("a", &[]), failing("b", &[]), passing("c", &["b"])],
        config(ExecutionMode::Sequential),
    )
    .unwrap();
    let mut events = engine.subscribe();

    engine.run().await.unwrap();

    let mut received = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.run_id, engine.run_id());
        received.push(envelope.event);
    }

    assert!(matches!(
        received.first(),
        Some(EngineEvent::Run(RunEvent::Started { total_tasks: 3, .. }))
    ));
    assert!(matches!(
        received.last(),
        Some(EngineEvent::Run(RunEvent::Completed {
            passed: 1,
            failed: 1,
            skipped: 1,
            ..
        }))
    ));
    assert!(received.iter().any(|event| matches!(
        event,
        EngineEvent::Task(TaskEvent::Skipped { task_id, .. }) if task_id == "c"
    )));
}

#[tokio::test]
async fn test_metrics_report_partial_counts_during_run() {
    let release = Arc::new(tokio::sync::Notify::new());
    let gate = Arc::clone(&release);
    let tasks = vec![
        passing("t1", &[]),
        passing("t2", &[]),
        passing("t3", &["t1"]),
        Task::builder("slow")
            .execute(move |_ctx| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok(())
                }
            })
            .build(),
    ];
    let engine = ExecutionEngine::new(tasks, config(ExecutionMode::Parallel)).unwrap();

    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    wait_for_status(&engine, "slow", TaskStatus::Running).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.metrics().passed < 3 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("fast tasks never finished");

    let partial = engine.metrics();
    assert_eq!(partial.total, 4);
    assert_eq!(partial.passed, 3);
    assert_eq!(partial.finished(), 3);
    assert_eq!(engine.status_of("slow"), Some(TaskStatus::Running));
    assert_eq!(engine.results().len(), 3);

    release.notify_one();
    let results = handle.await.unwrap().unwrap();
    assert_eq!(results.len(), 4);

    let done = engine.metrics();
    assert_eq!(done.passed, 4);
    assert!(done.is_success());
    assert_eq!(engine.status_of("slow"), Some(TaskStatus::Passed));
}

#[tokio::test]
async fn test_task_events_follow_recorded_results() {
    let engine = ExecutionEngine::new(
        vec![
            passing("a", &[]),
            failing("b", &["a"]),
            passing("c", &["b"]),
            passing("d", &["a"]),
        ],
        config(ExecutionMode::Parallel),
    )
    .unwrap();
    let mut events = engine.subscribe();

    let observer = engine.clone();
    let listener = tokio::spawn(async move {
        let mut seen = 0;
        while let Ok(envelope) = events.recv().await {
            let task_id = match envelope.event {
                EngineEvent::Task(TaskEvent::Passed { task_id, .. })
                | EngineEvent::Task(TaskEvent::Failed { task_id, .. })
                | EngineEvent::Task(TaskEvent::Skipped { task_id, .. }) => task_id,
                EngineEvent::Run(RunEvent::Completed { .. }) => break,
                _ => continue,
            };
            assert!(
                observer.results().iter().any(|r| r.task_id == task_id),
                "{task_id} was announced before its result was recorded"
            );
            assert!(observer.status_of(&task_id).is_some_and(|s| s.is_terminal()));
            seen += 1;
        }
        seen
    });

    engine.run().await.unwrap();
    assert_eq!(listener.await.unwrap(), 4);
}
