//! Tests for the tracing layer that feeds the relay.

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;

use courier::layer::RelayLayer;
use courier::relay::{LogMode, LogRelay};

use crate::support::{relay_with, RecordingNotifier};

fn emit_with_layer(relay: &Arc<LogRelay>, emit: impl FnOnce()) {
    let subscriber = tracing_subscriber::registry().with(RelayLayer::new(Arc::clone(relay)));
    tracing::subscriber::with_default(subscriber, emit);
}

fn pending(relay: &LogRelay) -> Vec<String> {
    relay.queue().drain_up_to(usize::MAX)
}

#[tokio::test]
async fn events_are_formatted_with_level() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    relay.start().expect("start should succeed");

    emit_with_layer(&relay, || {
        tracing::info!(target: "server::chat", "Steve joined the game");
        tracing::warn!(target: "server::world", "chunk save slow");
    });

    assert_eq!(
        pending(&relay),
        vec![
            "[INFO] Steve joined the game".to_owned(),
            "[WARN] chunk save slow".to_owned(),
        ]
    );
    relay.stop().await;
}

#[tokio::test]
async fn structured_fields_follow_the_message() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    relay.start().expect("start should succeed");

    emit_with_layer(&relay, || {
        tracing::info!(target: "server", player = "Alex", online = 3, "left the game");
    });

    assert_eq!(
        pending(&relay),
        vec!["[INFO] left the game player=Alex online=3".to_owned()]
    );
    relay.stop().await;
}

#[tokio::test]
async fn detached_relay_ignores_events() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));

    emit_with_layer(&relay, || tracing::info!(target: "server", "before start"));
    assert!(relay.queue().is_empty());

    relay.start().expect("start should succeed");
    relay.stop().await;
    emit_with_layer(&relay, || tracing::info!(target: "server", "after stop"));
    assert!(relay.queue().is_empty());
}

#[tokio::test]
async fn transport_targets_are_not_captured() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    relay.start().expect("start should succeed");

    emit_with_layer(&relay, || {
        tracing::debug!(target: "teloxide::requests", "sending message");
        tracing::warn!(target: "courier::notifier", "failed to deliver log batch");
        tracing::info!(target: "server", "kept");
    });

    assert_eq!(pending(&relay), vec!["[INFO] kept".to_owned()]);
    relay.stop().await;
}

#[tokio::test]
async fn relay_mode_changes_are_not_captured() {
    let (relay, _) = relay_with(LogMode::AllLogs, &[1], Arc::new(RecordingNotifier::new()));
    relay.start().expect("start should succeed");

    emit_with_layer(&relay, || {
        relay
            .set_mode(LogMode::AllLogs)
            .expect("set_mode should succeed");
    });

    assert!(relay.queue().is_empty());
    relay.stop().await;
}

#[tokio::test]
async fn important_only_filters_layer_events() {
    let (relay, _) = relay_with(
        LogMode::ImportantOnly,
        &[1],
        Arc::new(RecordingNotifier::new()),
    );
    relay.start().expect("start should succeed");

    emit_with_layer(&relay, || {
        tracing::info!(target: "server", "Steve JOINED the game");
        tracing::info!(target: "server", "autosave complete");
    });

    assert_eq!(pending(&relay), vec!["[INFO] Steve JOINED the game".to_owned()]);
    relay.stop().await;
}
