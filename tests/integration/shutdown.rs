//! Shutdown integration tests.
//!
//! Tests that verify a cycle stops its timers when asked to, without waiting
//! for executions that are already in flight.

use cadence::testing::{RecordingHandler, SlowTask};
use cadence::{Cycle, CycleError, CycleState, Event, EventBus, Job};
use std::sync::Arc;
use std::time::Duration;

use crate::common::counting_job;

#[tokio::test(start_paused = true)]
async fn test_run_until_stops_all_timers() {
    let (fast, fast_count) = counting_job("fast", Duration::from_millis(50));
    let (slow, slow_count) = counting_job("slow", Duration::from_millis(200));

    Cycle::new()
        .with_job(fast)
        .with_job(slow)
        .run_until(tokio::time::sleep(Duration::from_millis(420)))
        .await
        .unwrap();

    // fast: 0..=400 every 50ms; slow: 0, 200 and 400ms.
    assert_eq!(fast_count.count(), 9);
    assert_eq!(slow_count.count(), 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fast_count.count(), 9);
    assert_eq!(slow_count.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_does_not_wait_for_in_flight_tick() {
    let slow = Arc::new(SlowTask::new("slow", Duration::from_millis(300)));
    let cycle = Cycle::new().with_job(Job::new("slow", Duration::from_secs(10), slow.clone()));

    let (handle, task) = cycle.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(slow.started(), 1);

    let stop_requested = tokio::time::Instant::now();
    handle.stop().unwrap();
    task.await.unwrap().unwrap();

    assert!(stop_requested.elapsed() < Duration::from_millis(10));
    assert_eq!(slow.finished(), 0);
    assert_eq!(handle.state().await, CycleState::Stopped);

    // The detached tick still runs to completion.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(slow.finished(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handle_clones_share_state() {
    let (job, _count) = counting_job("job", Duration::from_millis(100));
    let (handle, task) = Cycle::new().with_job(job).start();
    let other = handle.clone();

    assert!(other.is_running().await);
    other.stop().unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(handle.state().await, CycleState::Stopped);
    assert!(matches!(handle.stop(), Err(CycleError::ChannelError(_))));
}

#[tokio::test(start_paused = true)]
async fn test_stop_emits_cycle_stopped() {
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;
    let (job, _count) = counting_job("job", Duration::from_millis(100));

    let (handle, task) = Cycle::new().with_event_bus(bus).with_job(job).start();
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.stop().unwrap();
    task.await.unwrap().unwrap();

    let events = handler.events().await;
    assert!(matches!(events.last(), Some(Event::CycleStopped { .. })));
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::JobTicked { .. }))
            .await,
        3
    );
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::CycleCancelled { .. }))
            .await,
        0
    );
}

#[tokio::test]
async fn test_empty_cycle_fails_to_start() {
    let (handle, task) = Cycle::new().start();

    let result = task.await.unwrap();

    assert!(matches!(result, Err(CycleError::NoJobs)));
    assert_eq!(handle.state().await, CycleState::Failed);
}
