//! Tests for `src/logging.rs`.

use courier::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber may be installed per process, so the
    // result is ignored; the directory is created before that step.
    let _result = courier::logging::init_production(&logs_dir, None);
    assert!(logs_dir.exists(), "logs directory should be created");
}
