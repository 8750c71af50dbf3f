//! Cycle integration tests.
//!
//! Independent timers, deferred startup and cascading cancellation, all on
//! tokio's paused clock so tick counts are exact.

use cadence::testing::{CountingTask, FailingTask, RecordingHandler, RecordingHooks, SlowTask};
use cadence::{
    Cycle, CycleError, Event, EventBus, Hooks, Job, JobId, TaskError, prepare, run,
};
use std::sync::Arc;
use std::time::Duration;

use crate::common::counting_job;

#[tokio::test(start_paused = true)]
async fn test_first_failure_stops_every_job() {
    let job_a = Arc::new(CountingTask::new("job_a").failing_on(3));
    let (job_b, counter_b) = counting_job("job_b", Duration::from_millis(150));

    let err = run([
        Job::new("job_a", Duration::from_millis(100), job_a.clone()),
        job_b,
    ])
    .await
    .unwrap_err();

    match &err {
        CycleError::JobFailed { job, source } => {
            assert_eq!(job.as_str(), "job_a");
            assert_eq!(source.to_string(), "execution failed: job_a failed on call 3");
        }
        other => panic!("Expected JobFailed, got {other:?}"),
    }

    // job_a ticked at 0, 100 and 200ms; job_b at 0 and 150ms.
    assert_eq!(job_a.count(), 3);
    assert_eq!(counter_b.count(), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(job_a.count(), 3);
    assert_eq!(counter_b.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deferred_job_waits_while_other_ticks_immediately() {
    let (deferred, deferred_count) = counting_job("deferred", Duration::from_secs(10));
    let (eager, eager_count) = counting_job("eager", Duration::from_secs(10));
    let cycle = Cycle::new()
        .with_job(deferred.with_defer(Duration::from_millis(500)))
        .with_job(eager);

    let (handle, task) = cycle.start();
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(499)).await;

    assert_eq!(eager_count.count(), 1);
    assert_eq!(deferred_count.count(), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(deferred_count.count(), 1);

    handle.stop().unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unsupervised_ticks_may_overlap() {
    let slow = Arc::new(SlowTask::new("slow", Duration::from_millis(250)));
    let cycle = Cycle::new().with_job(Job::new("slow", Duration::from_millis(100), slow.clone()));

    cycle
        .run_until(tokio::time::sleep(Duration::from_millis(220)))
        .await
        .unwrap();

    // Ticks at 0, 100 and 200ms all started; none has finished yet.
    assert_eq!(slow.started(), 3);
    assert_eq!(slow.finished(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_overlap_is_absorbed_by_handler() {
    let slow = Arc::new(SlowTask::new("slow", Duration::from_millis(250)));
    let recorder = RecordingHooks::new();
    let supervised = prepare(
        Job::new("slow", Duration::from_millis(100), slow.clone()),
        recorder.hooks_with_handler(),
    );

    Cycle::new()
        .with_job(supervised.to_job())
        .run_until(tokio::time::sleep(Duration::from_millis(350)))
        .await
        .unwrap();

    // 0ms runs until 250ms; 100 and 200ms are rejected; 300ms starts again.
    assert_eq!(slow.started(), 2);
    assert_eq!(slow.finished(), 1);
    let errors = recorder.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.starts_with("previous execution of job 'slow'")));
}

#[tokio::test(start_paused = true)]
async fn test_supervised_overlap_without_handler_cancels_cycle() {
    let slow = Arc::new(SlowTask::new("slow", Duration::from_millis(250)));
    let supervised = prepare(
        Job::new("slow", Duration::from_millis(100), slow.clone()),
        Hooks::new(),
    );

    let err = run([supervised.to_job()]).await.unwrap_err();

    assert!(matches!(
        err,
        CycleError::JobFailed {
            source: TaskError::PreviousExecutionNotComplete { .. },
            ..
        }
    ));
    assert_eq!(slow.started(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_timeout_cancels_cycle() {
    let slow = Arc::new(SlowTask::new("slow", Duration::from_millis(200)));
    let (other, other_count) = counting_job("other", Duration::from_millis(20));
    let supervised = prepare(
        Job::new("slow", Duration::from_secs(1), slow.clone())
            .with_timeout(Duration::from_millis(50)),
        Hooks::new(),
    );

    let err = run([supervised.to_job(), other]).await.unwrap_err();

    assert_eq!(err.job(), Some(&JobId::new("slow")));
    assert!(matches!(
        err,
        CycleError::JobFailed {
            source: TaskError::Timeout { .. },
            ..
        }
    ));
    // other ticked at 0, 20 and 40ms before the 50ms timeout.
    assert_eq!(other_count.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failing_error_handler_cancels_cycle() {
    let supervised = prepare(
        Job::new(
            "strict",
            Duration::from_millis(100),
            Arc::new(FailingTask::always("strict")),
        ),
        Hooks::new().on_error(|info, err| {
            Err(TaskError::ExecutionFailed(format!(
                "{} cannot tolerate: {err}",
                info.name
            )))
        }),
    );

    let err = run([supervised.to_job()]).await.unwrap_err();

    match err {
        CycleError::JobFailed {
            source: TaskError::ErrorHandler { name, .. },
            ..
        } => assert_eq!(name, "strict"),
        other => panic!("Expected ErrorHandler failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reports_one_failure_and_emits_event() {
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;

    let result = Cycle::new()
        .with_event_bus(bus)
        .with_job(Job::new(
            "a",
            Duration::from_millis(100),
            Arc::new(FailingTask::always("a")),
        ))
        .with_job(Job::new(
            "b",
            Duration::from_millis(100),
            Arc::new(FailingTask::always("b")),
        ))
        .run()
        .await;

    assert!(result.is_err());
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::CycleCancelled { .. }))
            .await,
        1
    );
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::CycleStopped { .. }))
            .await,
        0
    );
}
