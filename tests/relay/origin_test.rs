//! Tests for `src/relay/origin.rs`: self-log suppression.

use courier::relay::origin::{is_internal, NOTIFIER_TARGET};

#[test]
fn delivery_failure_message_is_internal() {
    assert!(is_internal(
        Some("server"),
        Some("failed to deliver log batch destination=1")
    ));
}

#[test]
fn bot_library_targets_are_internal() {
    assert!(is_internal(Some("teloxide::requests"), Some("whatever")));
    assert!(is_internal(Some("reqwest::connect"), None));
    assert!(is_internal(Some("hyper_util::client"), Some("pool idle")));
    assert!(is_internal(Some(NOTIFIER_TARGET), Some("log batch dispatched")));
}

#[test]
fn relay_own_target_is_internal() {
    assert!(is_internal(Some("courier::relay::dispatcher"), Some("tick")));
}

#[test]
fn console_bridge_marker_is_internal() {
    assert!(is_internal(None, Some("[telegram-console] /list")));
}

#[test]
fn ordinary_record_is_not_internal() {
    assert!(!is_internal(Some("server::chat"), Some("Steve joined the game")));
    assert!(!is_internal(None, None));
}

#[test]
fn marker_match_is_case_sensitive_for_type_name() {
    assert!(is_internal(None, Some("LogRelay queue overflow")));
    assert!(!is_internal(None, Some("logrelay mentioned in lowercase")));
}
