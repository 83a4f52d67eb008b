//! Cross-variant consistency checks for the closed error taxonomy: every
//! application-level variant's `error_code` module prefix agrees with the
//! module it's filed under in `error.rs`, and every 5xx-mapped variant is
//! flagged recoverable or explicitly excluded.

use taskforge_shared::error::TaskforgeError;

fn module_prefix(code: &str) -> &str {
    &code[1..4]
}

#[test]
fn error_codes_group_by_declared_module() {
    let cases: &[(TaskforgeError, &str)] = &[
        (TaskforgeError::InvalidPayload("x".into()), "100"),
        (TaskforgeError::MissingBearerToken, "200"),
        (TaskforgeError::UnknownApiKey, "200"),
        (TaskforgeError::InvalidInternalSecret, "200"),
        (
            TaskforgeError::TaskNotFound {
                task_id: "t".into(),
            },
            "300",
        ),
        (
            TaskforgeError::TaskAlreadyTerminal {
                task_id: "t".into(),
            },
            "300",
        ),
        (
            TaskforgeError::MaxRetriesExceeded {
                task_id: "t".into(),
            },
            "300",
        ),
        (
            TaskforgeError::UnsupportedTaskType {
                task_type: "t".into(),
            },
            "400",
        ),
        (TaskforgeError::InferenceFailed("x".into()), "400"),
        (TaskforgeError::ObjectStoreUnavailable("x".into()), "500"),
        (
            TaskforgeError::ObjectNotFound {
                bucket: "b".into(),
                key: "k".into(),
            },
            "500",
        ),
        (TaskforgeError::QueueUnavailable("x".into()), "600"),
        (TaskforgeError::PublishFailed("x".into()), "600"),
        (TaskforgeError::RegistryUnavailable("x".into()), "700"),
        (
            TaskforgeError::NoCapableWorker {
                task_type: "t".into(),
            },
            "700",
        ),
        (TaskforgeError::LogPublishFailed("x".into()), "800"),
        (TaskforgeError::Internal("x".into()), "900"),
        (TaskforgeError::Timeout("x".into()), "900"),
    ];

    for (err, expected_prefix) in cases {
        let code = err.error_code();
        assert_eq!(
            module_prefix(code),
            *expected_prefix,
            "error_code {code} for {err:?} should carry module prefix {expected_prefix}"
        );
    }
}

#[test]
fn validation_and_auth_errors_are_never_recoverable() {
    assert!(!TaskforgeError::InvalidPayload("x".into()).is_recoverable());
    assert!(!TaskforgeError::MissingBearerToken.is_recoverable());
    assert!(!TaskforgeError::UnknownApiKey.is_recoverable());
    assert!(!TaskforgeError::InvalidInternalSecret.is_recoverable());
    assert!(!TaskforgeError::TaskNotFound {
        task_id: "t".into()
    }
    .is_recoverable());
}

#[test]
fn transient_infrastructure_errors_are_recoverable() {
    assert!(TaskforgeError::ObjectStoreUnavailable("x".into()).is_recoverable());
    assert!(TaskforgeError::QueueUnavailable("x".into()).is_recoverable());
    assert!(TaskforgeError::RegistryUnavailable("x".into()).is_recoverable());
    assert!(TaskforgeError::Timeout("x".into()).is_recoverable());
}
