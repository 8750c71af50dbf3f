//! Supervised execution integration tests.
//!
//! Exercises `prepare` through the public API the way callers use it.

use cadence::testing::{
    CountingTask, FailingTask, HookCall, PendingTask, RecordingHooks, SlowTask,
};
use cadence::{
    Hooks, Job, JobInfo, JobStatus, Task, TaskError, TaskRef, prepare, sequence, task_fn,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_repeated_successful_runs_alternate_pending_and_running() {
    let task = Arc::new(CountingTask::new("steady"));
    let recorder = RecordingHooks::new();
    let prepared = prepare(
        Job::new("steady", Duration::from_millis(10), task.clone()),
        recorder.hooks(),
    );

    for _ in 0..5 {
        prepared.run().await.unwrap();
        assert_eq!(prepared.status(), JobStatus::Pending);
    }

    assert_eq!(task.count(), 5);
    let statuses: Vec<JobStatus> = recorder
        .calls()
        .into_iter()
        .map(|call| match call {
            HookCall::Before(info) | HookCall::After(info) => info.status,
            HookCall::Error(info, _) => panic!("unexpected error for {}", info.name),
        })
        .collect();
    assert_eq!(
        statuses,
        [JobStatus::Running, JobStatus::Pending].repeat(5)
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_run_while_first_pending_is_rejected() {
    let task = Arc::new(PendingTask::new("stuck"));
    let prepared = prepare(
        Job::new("stuck", Duration::from_secs(1), task.clone()),
        Hooks::new(),
    );

    let first = prepared.clone();
    tokio::spawn(async move { first.run().await });
    tokio::task::yield_now().await;

    let err = prepared.run().await.unwrap_err();

    assert!(err.is_supervision_error());
    assert_eq!(
        err.to_string(),
        "previous execution of job 'stuck' has not completed (status: running)"
    );
    assert_eq!(task.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_before_slow_task_finishes() {
    let task = Arc::new(SlowTask::new("slow", Duration::from_millis(200)));
    let prepared = prepare(
        Job::new("slow", Duration::from_secs(1), task.clone())
            .with_timeout(Duration::from_millis(50)),
        Hooks::new(),
    );

    let start = tokio::time::Instant::now();
    let err = prepared.run().await.unwrap_err();

    assert!(start.elapsed() < Duration::from_millis(60));
    assert!(matches!(err, TaskError::Timeout { .. }));
    assert_eq!(prepared.status(), JobStatus::Error);
    assert_eq!(task.started(), 1);
    assert_eq!(task.finished(), 0);
}

#[tokio::test]
async fn test_error_handler_invoked_once_and_run_succeeds() {
    let recorder = RecordingHooks::new();
    let prepared = prepare(
        Job::new(
            "flaky",
            Duration::from_secs(1),
            Arc::new(FailingTask::with_error("flaky", 1, "upstream unavailable")),
        ),
        recorder.hooks_with_handler(),
    );

    prepared.run().await.unwrap();

    assert_eq!(
        recorder.errors(),
        vec!["execution failed: upstream unavailable".to_string()]
    );
    assert_eq!(prepared.status(), JobStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_error_handler_absorbs_overlap_and_timeout() {
    let recorder = RecordingHooks::new();
    let prepared = prepare(
        Job::new(
            "slow",
            Duration::from_secs(1),
            Arc::new(SlowTask::new("slow", Duration::from_millis(200))),
        )
        .with_timeout(Duration::from_millis(100)),
        recorder.hooks_with_handler(),
    );

    let first = prepared.clone();
    let in_flight = tokio::spawn(async move { first.run().await });
    tokio::task::yield_now().await;

    prepared.run().await.unwrap();
    in_flight.await.unwrap().unwrap();

    let errors = recorder.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("previous execution of job 'slow'"));
    assert!(errors[1].starts_with("job 'slow' timed out after 100ms"));
}

#[tokio::test]
async fn test_hooks_see_read_only_snapshots() {
    let seen: Arc<std::sync::Mutex<Vec<JobInfo>>> = Arc::default();
    let before_seen = Arc::clone(&seen);
    let prepared = prepare(
        Job::new(
            "snap",
            Duration::from_secs(1),
            task_fn("snap", || async { Ok(()) }),
        ),
        Hooks::new().before(move |info| before_seen.lock().unwrap().push(info.clone())),
    );

    prepared.run().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "snap");
    assert_eq!(seen[0].status, JobStatus::Running);
}

#[tokio::test]
async fn test_sequence_stops_at_failing_step() {
    let a = Arc::new(CountingTask::new("a"));
    let b = Arc::new(FailingTask::with_error("b", 1, "b broke"));
    let c = Arc::new(CountingTask::new("c"));

    let steps: [TaskRef; 3] = [a.clone(), b.clone(), c.clone()];
    let composed = sequence(steps);
    let err = composed.run().await.unwrap_err();

    assert_eq!(err.to_string(), "execution failed: b broke");
    assert_eq!(a.count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.count(), 0);
}

#[tokio::test]
async fn test_supervised_sequence_runs_as_one_job() {
    let first = Arc::new(CountingTask::new("first"));
    let second = Arc::new(CountingTask::new("second"));
    let steps: [TaskRef; 2] = [first.clone(), second.clone()];
    let body = sequence(steps)
        .named("pipeline")
        .into_ref();
    let prepared = prepare(Job::new("pipeline", Duration::from_secs(1), body), Hooks::new());

    prepared.run().await.unwrap();

    assert_eq!(prepared.status(), JobStatus::Pending);
    assert_eq!((first.count(), second.count()), (1, 1));
}
