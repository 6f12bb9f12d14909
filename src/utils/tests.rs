use super::logging;
use super::MessagingError;
use uuid::Uuid;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
    logging::init("nonsense");
}

#[test]
fn unknown_levels_fall_back_to_info() {
    assert!(logging::directive("nonsense").starts_with("info,"));
    assert!(logging::directive("WARNING").starts_with("warn,"));
    assert!(logging::directive("trace").contains("sled=warn"));
}

#[test]
fn integrity_failures_are_classified() {
    let id = Uuid::new_v4();
    assert!(
        MessagingError::ChecksumMismatch {
            message_id: id,
            expected: "a".into(),
            actual: "b".into(),
        }
        .is_integrity_failure()
    );
    assert!(MessagingError::DecryptionError("bad key".into()).is_integrity_failure());
    assert!(!MessagingError::TransportFailure("timeout".into()).is_integrity_failure());
}

#[test]
fn error_messages_name_the_message() {
    let id = Uuid::new_v4();
    let err = MessagingError::DuplicatePart {
        message_id: id,
        part_no: 2,
    };
    let text = err.to_string();
    assert!(text.contains(&id.to_string()));
    assert!(text.contains("(2)"));
}
