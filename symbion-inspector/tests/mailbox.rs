//! Coordinateur derrière sa boîte aux lettres, comme en production

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use symbion_devkit::{report, settle, wait_until, MockReporter, RecordingDispatcher, TestHarness};
use symbion_inspector::{
    shutdown, spawn_coordinator, InspectionCoordinator, InspectionError, InspectionOptions, PushError, TargetId,
    TokioScheduler,
};

#[tokio::test]
async fn test_scenario_reply_lands_in_snapshot() {
    let harness = TestHarness::new();
    harness.dispatcher.respond_for("A", json!({"state": "idle"}));

    let (handle, _task) = harness.spawn_with_targets(&["A", "B"]).unwrap();
    assert!(handle.query_snapshot().await.unwrap().is_empty());

    handle.start().unwrap();
    harness.fire_and_settle(&handle).await.unwrap();

    assert_eq!(harness.reporter.pushes(), vec![vec![]]);
    assert_eq!(harness.dispatcher.requested_targets(), vec![TargetId::new("A"), TargetId::new("B")]);

    let snapshot = handle.query_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[&TargetId::new("A")].payload, json!({"state": "idle"}));
    assert!(!snapshot.contains_key(&TargetId::new("B")));
}

#[tokio::test]
async fn test_last_report_wins_across_cycles() {
    let harness = TestHarness::new();
    let (handle, _task) = harness.spawn_with_targets(&["a"]).unwrap();
    handle.start().unwrap();

    handle.report_received(report("a", json!({"seq": 1}))).unwrap();
    harness.fire_and_settle(&handle).await.unwrap();
    handle.report_received(report("a", json!({"seq": 2}))).unwrap();

    let snapshot = handle.query_snapshot().await.unwrap();
    assert_eq!(snapshot[&TargetId::new("a")].payload, json!({"seq": 2}));
    // le premier cycle a poussé seq=1
    assert_eq!(harness.reporter.last_push().unwrap()[0].payload, json!({"seq": 1}));
}

#[tokio::test]
async fn test_unavailable_collector_keeps_mailbox_alive() {
    let harness = TestHarness::new();
    harness.reporter.fail_next_unavailable();
    let (handle, task) = harness.spawn_with_targets(&["a", "b"]).unwrap();
    handle.start().unwrap();

    harness.fire_and_settle(&handle).await.unwrap();
    assert_eq!(harness.dispatcher.request_count(), 2);
    assert!(!task.is_finished());

    harness.fire_and_settle(&handle).await.unwrap();
    assert_eq!(harness.reporter.push_count(), 2);
    assert_eq!(harness.dispatcher.request_count(), 4);
}

#[tokio::test]
async fn test_fatal_push_ends_mailbox_with_error() {
    let harness = TestHarness::new();
    harness.reporter.fail_next_with(PushError::Transport("tls handshake".into()));
    let (handle, task) = harness.spawn_with_targets(&["a"]).unwrap();
    handle.start().unwrap();

    harness.scheduler.fire().unwrap();
    let result = task.await.unwrap();

    assert!(matches!(result, Err(InspectionError::Push(PushError::Transport(_)))));
    assert_eq!(harness.dispatcher.request_count(), 0);
    assert!(harness.scheduler.is_cancelled());
    assert!(matches!(handle.query_snapshot().await, Err(InspectionError::MailboxClosed)));
}

#[tokio::test]
async fn test_triggers_ignored_outside_running() {
    let harness = TestHarness::new();
    let (handle, _task) = harness.spawn_with_targets(&["a"]).unwrap();

    // avant start
    handle.inspect().unwrap();
    settle(&handle).await.unwrap();
    assert_eq!(harness.reporter.push_count(), 0);

    handle.start().unwrap();
    harness.fire_and_settle(&handle).await.unwrap();
    assert_eq!(harness.reporter.push_count(), 1);

    // tick en retard après stop
    handle.stop().unwrap();
    handle.inspect().unwrap();
    settle(&handle).await.unwrap();
    assert_eq!(harness.reporter.push_count(), 1);
    assert!(harness.scheduler.is_cancelled());

    // requêtes et enregistrement toujours servis
    handle.register_target("b").unwrap();
    assert_eq!(handle.targets().await.unwrap(), vec![TargetId::new("a"), TargetId::new("b")]);
}

#[tokio::test]
async fn test_lifecycle_misuse_is_not_fatal() {
    let harness = TestHarness::new();
    let (handle, task) = harness.spawn_with_targets(&[]).unwrap();

    handle.stop().unwrap();
    handle.start().unwrap();
    handle.start().unwrap();
    settle(&handle).await.unwrap();

    assert_eq!(harness.scheduler.calls().len(), 1);
    assert!(!task.is_finished());
}

#[tokio::test]
async fn test_mailbox_closes_when_handles_dropped() {
    let harness = TestHarness::new();
    let (handle, task) = harness.spawn_with_targets(&["a"]).unwrap();
    drop(handle);

    assert!(task.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_drives_cycles() {
    let reporter = MockReporter::new();
    let dispatcher = RecordingDispatcher::new();
    dispatcher.respond_for("a", json!({"ok": true}));

    let coordinator = InspectionCoordinator::new(
        InspectionOptions { startup_delay_ms: 5000, interval_ms: 5000 },
        Arc::new(reporter.clone()),
        Arc::new(dispatcher.clone()),
        Arc::new(TokioScheduler::new()),
    );
    let (handle, _task) = spawn_coordinator(coordinator);
    handle.register_target("a").unwrap();
    handle.start().unwrap();

    tokio::time::sleep(Duration::from_millis(4000)).await;
    assert_eq!(reporter.push_count(), 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(reporter.push_count(), 1);
    assert_eq!(reporter.last_push(), Some(vec![]));

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(reporter.push_count(), 2);
    assert_eq!(reporter.last_push().unwrap().len(), 1);

    handle.stop().unwrap();
    settle(&handle).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60_000)).await;
    assert_eq!(reporter.push_count(), 2);
}

#[tokio::test]
async fn test_wait_for_reply_from_slow_target() {
    let harness = TestHarness::new();
    let (handle, _task) = harness.spawn_with_targets(&["slow"]).unwrap();
    handle.start().unwrap();
    harness.fire_and_settle(&handle).await.unwrap();

    // la réponse arrive bien après le cycle, hors de toute corrélation
    let late = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = late.report_received(report("slow", json!({"late": true})));
    });

    let landed = wait_until(1000, || {
        let handle = handle.clone();
        async move {
            handle
                .query_snapshot()
                .await
                .map(|s| s.contains_key(&TargetId::new("slow")))
                .unwrap_or(false)
        }
    })
    .await;
    assert!(landed);
}

#[tokio::test]
async fn test_shutdown_waits_for_stop_and_mailbox_close() {
    let harness = TestHarness::new();
    let (handle, task) = harness.spawn_with_targets(&["a"]).unwrap();
    handle.start().unwrap();
    settle(&handle).await.unwrap();
    assert!(harness.scheduler.is_scheduled());

    assert!(shutdown(handle, task, Duration::from_secs(1)).await);
    assert!(harness.scheduler.is_cancelled());
}

#[tokio::test]
async fn test_shutdown_times_out_while_another_handle_is_alive() {
    let harness = TestHarness::new();
    let (handle, task) = harness.spawn_with_targets(&["a"]).unwrap();
    let still_held = handle.clone();
    handle.start().unwrap();

    assert!(!shutdown(handle, task, Duration::from_millis(100)).await);

    // Stop a bien été traité, la boîte reste ouverte pour l'adresse restante
    assert!(harness.scheduler.is_cancelled());
    assert!(still_held.query_snapshot().await.is_ok());
}
