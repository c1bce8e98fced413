use gharbato_store::StoreError;
use thiserror::Error;

/// Why a message could not be sent, read or updated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The store could not be reached. The caller may retry.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The store refused the write. Retrying the same write will not help.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rejected before any network call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unexpected failure inside the store backend.
    #[error("Store error: {0}")]
    Store(String),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::NetworkUnavailable(_))
    }
}

impl From<StoreError> for SendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => SendError::NetworkUnavailable(reason),
            StoreError::PermissionDenied(reason) => SendError::PermissionDenied(reason),
            StoreError::InvalidPath { .. } => SendError::InvalidArgument(err.to_string()),
            other => SendError::Store(other.to_string()),
        }
    }
}

/// Why a call invitation could not be placed or cleared.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The write to the target's mailbox failed.
    #[error("Call target unreachable: {0}")]
    TargetUnreachable(String),

    /// Missing call id or target, or the invitation is no longer pending.
    #[error("Invalid invitation: {0}")]
    InvalidInvitation(String),
}

impl From<StoreError> for SignalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPath { .. } => SignalError::InvalidInvitation(err.to_string()),
            other => SignalError::TargetUnreachable(other.to_string()),
        }
    }
}

/// Failure reported to a listener. The subscription is over once a listener
/// has seen one of these; subscribe again to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Store closed")]
    StoreClosed,

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(reason) => RelayError::PermissionDenied(reason),
            StoreError::Unavailable(reason) => RelayError::Unavailable(reason),
            StoreError::InvalidPath { .. } => RelayError::InvalidPath(err.to_string()),
            StoreError::Closed => RelayError::StoreClosed,
            other => RelayError::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_send_errors() {
        let err = SendError::from(StoreError::Unavailable("offline".into()));
        assert_eq!(err, SendError::NetworkUnavailable("offline".into()));
        assert!(err.is_retryable());

        let err = SendError::from(StoreError::PermissionDenied("rules".into()));
        assert!(matches!(err, SendError::PermissionDenied(_)));
        assert!(!err.is_retryable());

        let err = SendError::from(StoreError::InvalidPath {
            path: "a.b".into(),
            reason: "bad",
        });
        assert!(matches!(err, SendError::InvalidArgument(_)));
    }

    #[test]
    fn store_errors_map_to_signal_errors() {
        assert!(matches!(
            SignalError::from(StoreError::Unavailable("offline".into())),
            SignalError::TargetUnreachable(_)
        ));
        assert!(matches!(
            SignalError::from(StoreError::PermissionDenied("rules".into())),
            SignalError::TargetUnreachable(_)
        ));
        assert!(matches!(
            SignalError::from(StoreError::InvalidPath {
                path: "x".into(),
                reason: "bad"
            }),
            SignalError::InvalidInvitation(_)
        ));
    }

    #[test]
    fn store_errors_map_to_relay_errors() {
        assert_eq!(RelayError::from(StoreError::Closed), RelayError::StoreClosed);
        assert!(matches!(
            RelayError::from(StoreError::PermissionDenied("revoked".into())),
            RelayError::PermissionDenied(_)
        ));
    }
}
