use crate::auth_error;
use crate::error::{AuthError, ErrorContext};
use crate::models::CredentialKey;

#[test]
fn test_error_context_on_result() {
    let result: Result<i32, std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "file not found",
    ));

    match result.context("Failed to read store key") {
        Err(AuthError::Internal(msg)) => {
            assert!(msg.contains("Failed to read store key"));
            assert!(msg.contains("file not found"));
        }
        _ => panic!("Expected AuthError::Internal"),
    }
}

#[test]
fn test_error_context_on_option() {
    let option: Option<String> = None;
    match option.context("workspace missing") {
        Err(AuthError::Internal(msg)) => assert_eq!(msg, "workspace missing"),
        _ => panic!("Expected AuthError::Internal"),
    }
}

#[test]
fn test_auth_error_macro() {
    match auth_error!(OAuth, "invalid_client") {
        AuthError::OAuth(msg) => assert_eq!(msg, "invalid_client"),
        _ => panic!("Expected AuthError::OAuth"),
    }

    match auth_error!(StoreUnavailable, "backend {} offline", "keyring") {
        AuthError::StoreUnavailable(msg) => assert_eq!(msg, "backend keyring offline"),
        _ => panic!("Expected AuthError::StoreUnavailable"),
    }
}

#[test]
fn test_exit_codes_by_class() {
    let reauth = [
        AuthError::NotFound(CredentialKey::new("org", "default")),
        AuthError::InvalidCredential("bad".into()),
        AuthError::AuthenticationRequired {
            workspace: "acme".into(),
        },
    ];
    for e in &reauth {
        assert_eq!(e.exit_code(), 2, "{}", e);
    }

    assert_eq!(AuthError::StoreUnavailable("x".into()).exit_code(), 69);
    assert_eq!(AuthError::TransientNetworkError("x".into()).exit_code(), 75);
    assert_eq!(AuthError::NoActiveWorkspace.exit_code(), 78);
    assert_eq!(AuthError::Config("x".into()).exit_code(), 78);
    assert_eq!(AuthError::Api("x".into()).exit_code(), 1);
}

#[test]
fn test_only_transient_errors_are_retryable() {
    assert!(AuthError::TransientNetworkError("timeout".into()).is_retryable());
    assert!(!AuthError::InvalidCredential("rejected".into()).is_retryable());
    assert!(!AuthError::StoreUnavailable("locked".into()).is_retryable());
}

#[test]
fn test_hint_points_at_login_when_expired() {
    let e = AuthError::AuthenticationRequired {
        workspace: "acme".into(),
    };
    assert!(e.hint().contains("linear auth login"));
    assert_eq!(e.to_string(), "Authentication expired for workspace acme");
}

#[test]
fn test_duplicate_keeps_class_and_message() {
    let original = AuthError::AuthenticationRequired {
        workspace: "acme".into(),
    };
    let copy = original.duplicate();
    assert_eq!(copy.to_string(), original.to_string());
    assert_eq!(copy.exit_code(), 2);

    let io = AuthError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
    assert!(matches!(io.duplicate(), AuthError::Io(ref e) if e.kind() == std::io::ErrorKind::PermissionDenied));
}
