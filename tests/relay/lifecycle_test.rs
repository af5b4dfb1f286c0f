//! Tests for relay start/stop and the timed dispatcher loop.
//!
//! Uses paused Tokio time so interval ticks are deterministic.

use std::sync::Arc;
use std::time::Duration;

use courier::relay::{LogMode, LogRecord, RecordOutcome, RelayError, StopOutcome};

use crate::support::{relay_with, RecordingNotifier};

fn record(message: &str) -> LogRecord {
    LogRecord::new("INFO", "server", message)
}

#[tokio::test(start_paused = true)]
async fn first_flush_waits_one_period() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    relay.on_record(&record("hello"));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(notifier.sent().is_empty(), "no flush before the first period");

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "[INFO] hello");

    assert_eq!(relay.stop().await, Some(StopOutcome::Graceful));
}

#[tokio::test(start_paused = true)]
async fn backlog_drains_five_lines_per_tick() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1, 2], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    for i in 0..12 {
        relay.on_record(&record(&format!("line {i}")));
    }

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(notifier.sent().len(), 2);
    assert_eq!(relay.queue().len(), 7);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(notifier.sent().len(), 6);
    assert!(relay.queue().is_empty());

    relay.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_sends_after_stop() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    assert!(relay.is_attached());

    assert_eq!(relay.stop().await, Some(StopOutcome::Graceful));
    assert!(!relay.is_attached());

    assert_eq!(relay.on_record(&record("late")), RecordOutcome::Queued);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(notifier.sent().is_empty());
    assert_eq!(relay.queue().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));

    relay.start().expect("first start");
    relay.start().expect("second start is a no-op");

    assert!(relay.stop().await.is_some());
    assert!(relay.stop().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_tick_within_grace_finishes() {
    let notifier = Arc::new(RecordingNotifier::slow(Duration::from_secs(1)));
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    relay.on_record(&record("in flight"));

    // The tick starts at 2s and is blocked in the notifier until 3s.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(relay.stop().await, Some(StopOutcome::Graceful));
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tick_overrunning_grace_is_aborted_and_batch_lost() {
    let notifier = Arc::new(RecordingNotifier::slow(Duration::from_secs(60)));
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    relay.on_record(&record("doomed"));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(relay.stop().await, Some(StopOutcome::Aborted));

    assert!(notifier.sent().is_empty());
    assert!(relay.queue().is_empty(), "the in-flight batch is not requeued");
    assert_eq!(relay.mode(), LogMode::AllLogs);
}

#[tokio::test(start_paused = true)]
async fn close_detaches_without_waiting() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");

    relay.close();
    assert!(!relay.is_attached());
    relay.on_record(&record("after close"));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(notifier.sent().is_empty());
    assert!(relay.stop().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn set_mode_disabled_pauses_running_dispatcher() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    relay.on_record(&record("queued before pause"));

    relay.set_mode(LogMode::Disabled).expect("set_mode should succeed");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(notifier.sent().is_empty());
    assert_eq!(relay.queue().len(), 1, "pending lines are kept while disabled");

    relay.set_mode(LogMode::AllLogs).expect("set_mode should succeed");
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(notifier.sent().len(), 1);

    relay.stop().await;
}

#[test]
fn start_outside_runtime_fails() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    assert!(matches!(relay.start(), Err(RelayError::NoRuntime)));
    assert!(!relay.is_attached());
}

#[tokio::test(start_paused = true)]
async fn flush_does_not_send() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::clone(&notifier));
    relay.start().expect("start should succeed");
    relay.on_record(&record("waiting for the timer"));

    relay.flush();
    tokio::task::yield_now().await;

    assert!(notifier.sent().is_empty());
    assert_eq!(relay.queue().len(), 1);
    relay.stop().await;
}

#[tokio::test(start_paused = true)]
async fn spawned_handle_reports_running_until_stopped() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    let handle = relay
        .dispatcher()
        .spawn(Duration::from_secs(2), Duration::from_secs(5));
    tokio::task::yield_now().await;

    assert!(handle.is_running());
    assert_eq!(handle.stop().await, StopOutcome::Graceful);
}
