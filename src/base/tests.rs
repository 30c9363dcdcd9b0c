use crate::base::loadstate::LoadState;
use crate::base::neterror::{BoxError, ErrorKind, NetError};

#[test]
fn test_error_kinds() {
    assert_eq!(NetError::EmptyUrl.kind(), ErrorKind::Validation);
    assert_eq!(NetError::SessionAndSessionId.kind(), ErrorKind::Conflict);
    assert_eq!(
        NetError::SessionClosed { id: "s".into() }.kind(),
        ErrorKind::ClosedResource
    );
    assert_eq!(NetError::TooManyRedirects.kind(), ErrorKind::Engine);
    assert_eq!(
        NetError::JsonParse { message: "x".into() }.kind(),
        ErrorKind::Parse
    );
    assert_eq!(NetError::BodyUsed.kind(), ErrorKind::Type);
}

#[test]
fn test_aborted_message_carries_reason() {
    let err = NetError::Aborted {
        reason: Some("user navigated away".into()),
    };
    assert!(err.is_cancellation());
    assert_eq!(err.to_string(), "Request was aborted: user navigated away");

    let bare = NetError::Aborted { reason: None };
    assert_eq!(bare.to_string(), "Request was aborted");
}

#[test]
fn test_from_engine_keeps_net_error() {
    let boxed: BoxError = Box::new(NetError::TimedOut { timeout_ms: 500 });
    assert_eq!(
        NetError::from_engine(boxed),
        NetError::TimedOut { timeout_ms: 500 }
    );
}

#[test]
fn test_from_engine_wraps_foreign_error() {
    let boxed: BoxError = Box::new(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "pipe closed",
    ));
    let err = NetError::from_engine(boxed);
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.to_string().contains("pipe closed"));
}

#[test]
fn test_load_state_terminal() {
    assert!(!LoadState::Idle.is_terminal());
    assert!(!LoadState::CallingEngine.is_terminal());
    assert!(LoadState::Succeeded.is_terminal());
    assert!(LoadState::Cancelled.is_terminal());
}
