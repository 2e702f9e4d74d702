//! Error taxonomy for remote machine sessions and command invocation.
//!
//! Every failure that can reach the caller of the orchestrator is a variant of
//! [`MachineError`]. Variants map onto a stable kind name (printed on stderr by
//! the binaries) and a distinct process exit code.
//!
//! # Classifying opaque transport failures
//!
//! Transports built on a vendor SDK usually only surface a message string when
//! dialing fails. [`MachineError::from_dial_failure`] sorts such strings into
//! [`MachineError::Auth`] or [`MachineError::Network`]:
//!
//! 1. **Authentication failures** are matched first. If a message carries both
//!    authentication and network keywords it is classified as an auth failure,
//!    so bad credentials are never retried.
//! 2. **Everything else** is treated as a network failure.
//!
//! Only [`MachineError::Network`] is retryable, and only while connecting.
//! Command invocation is never retried.

use thiserror::Error;

/// Result alias used across the machine client.
pub type Result<T> = std::result::Result<T, MachineError>;

/// Authentication error patterns that indicate rejected credentials.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "unauthenticated",
    "unauthorized",
    "permission denied",
    "invalid api key",
    "api key rejected",
    "credentials rejected",
    "auth fail",
    "forbidden",
];

/// Failure categories surfaced by the machine client.
#[derive(Debug, Error)]
pub enum MachineError {
    /// Connection configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The remote machine rejected the supplied credentials.
    #[error("authentication rejected by {address}: {message}")]
    Auth { address: String, message: String },

    /// The remote machine could not be reached.
    #[error("could not reach {address}: {message}")]
    Network { address: String, message: String },

    /// `connect` was called on a client that already holds a session.
    #[error("client is already connected to {0}")]
    AlreadyConnected(String),

    /// The client holds no open session, or the handle belongs to a session
    /// that has been closed.
    #[error("client is not connected")]
    NotConnected,

    /// No resource with this name is exposed by the machine.
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),

    /// The resource exists but has a different kind than requested.
    #[error("resource '{name}' is a {actual}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// The payload failed local pre-flight checks or remote-side validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The remote side ran the command and reported a failure.
    #[error("remote execution failed{}: {message}", code_suffix(.code))]
    RemoteExecution { code: Option<i32>, message: String },

    /// The round trip itself failed after the handle was resolved.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The enclosing operation was interrupted by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Local I/O failed: starting the runtime or writing output.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl MachineError {
    /// Classify a dial failure message reported by an opaque transport.
    pub fn from_dial_failure(address: impl Into<String>, message: impl Into<String>) -> Self {
        let address = address.into();
        let message = message.into();

        if is_auth_failure(&message) {
            MachineError::Auth { address, message }
        } else {
            MachineError::Network { address, message }
        }
    }

    /// Stable name of the failure category, as printed by the binaries.
    pub fn kind(&self) -> &'static str {
        match self {
            MachineError::InvalidConfig(_) => "InvalidConfig",
            MachineError::Auth { .. } => "AuthError",
            MachineError::Network { .. } => "NetworkError",
            MachineError::AlreadyConnected(_) => "AlreadyConnected",
            MachineError::NotConnected => "NotConnected",
            MachineError::ResourceNotFound(_) => "ResourceNotFound",
            MachineError::KindMismatch { .. } => "KindMismatch",
            MachineError::InvalidPayload(_) => "InvalidPayload",
            MachineError::RemoteExecution { .. } => "RemoteExecutionError",
            MachineError::Transport(_) => "TransportError",
            MachineError::Cancelled => "Cancelled",
            MachineError::Io(_) => "IoError",
        }
    }

    /// Whether this failure belongs to the connection group
    /// (`AuthError`, `NetworkError`, `AlreadyConnected`).
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MachineError::Auth { .. }
                | MachineError::Network { .. }
                | MachineError::AlreadyConnected(_)
        )
    }

    /// Whether a connect attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MachineError::Network { .. })
    }

    /// Process exit code reported by the binaries for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            MachineError::InvalidConfig(_) => 2,
            MachineError::Auth { .. } => 3,
            MachineError::Network { .. } => 4,
            MachineError::AlreadyConnected(_) | MachineError::NotConnected => 5,
            MachineError::ResourceNotFound(_) | MachineError::KindMismatch { .. } => 6,
            MachineError::InvalidPayload(_) => 7,
            MachineError::RemoteExecution { .. } => 8,
            MachineError::Transport(_) => 9,
            MachineError::Io(_) => 10,
            MachineError::Cancelled => 130,
        }
    }
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

/// Determines if a failure message describes rejected credentials.
///
/// Matching is case-insensitive and checked against [`AUTH_ERRORS`].
pub(crate) fn is_auth_failure(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    AUTH_ERRORS
        .iter()
        .any(|pattern| message_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod dial_failure_classification {
        use super::*;

        #[test]
        fn test_permission_denied_is_auth() {
            let err = MachineError::from_dial_failure("sim://locked", "Permission denied");
            assert!(matches!(err, MachineError::Auth { .. }));
            assert_eq!(err.kind(), "AuthError");
        }

        #[test]
        fn test_invalid_api_key_is_auth() {
            let err = MachineError::from_dial_failure("sim://locked", "INVALID API KEY supplied");
            assert!(matches!(err, MachineError::Auth { .. }));
        }

        #[test]
        fn test_unauthenticated_status_is_auth() {
            let err = MachineError::from_dial_failure("a.viam.cloud", "rpc error: Unauthenticated");
            assert!(matches!(err, MachineError::Auth { .. }));
        }

        #[test]
        fn test_connection_refused_is_network() {
            let err = MachineError::from_dial_failure("sim://unreachable", "connection refused");
            assert!(matches!(err, MachineError::Network { .. }));
            assert_eq!(err.kind(), "NetworkError");
        }

        #[test]
        fn test_unknown_message_is_network() {
            let err = MachineError::from_dial_failure("sim://x", "something went wrong");
            assert!(matches!(err, MachineError::Network { .. }));
        }

        #[test]
        fn test_auth_takes_precedence_over_network() {
            let err = MachineError::from_dial_failure(
                "sim://x",
                "connection timed out after authentication failed",
            );
            assert!(matches!(err, MachineError::Auth { .. }));
        }

        #[test]
        fn test_address_is_kept() {
            let err = MachineError::from_dial_failure("sim://ok", "no route to host");
            assert_eq!(err.to_string(), "could not reach sim://ok: no route to host");
        }
    }

    mod categories {
        use super::*;

        #[test]
        fn test_only_network_is_retryable() {
            assert!(MachineError::Network {
                address: "a".into(),
                message: "m".into()
            }
            .is_retryable());
            assert!(!MachineError::Auth {
                address: "a".into(),
                message: "m".into()
            }
            .is_retryable());
            assert!(!MachineError::Transport("reset".into()).is_retryable());
            assert!(!MachineError::NotConnected.is_retryable());
        }

        #[test]
        fn test_io_error_has_own_kind() {
            let err = MachineError::from(std::io::Error::other("disk full"));
            assert_eq!(err.kind(), "IoError");
            assert_eq!(err.exit_code(), 10);
            assert!(!err.is_retryable());
            assert_eq!(err.to_string(), "i/o failure: disk full");
        }

        #[test]
        fn test_connection_group() {
            assert!(MachineError::AlreadyConnected("sim://ok".into()).is_connection_error());
            assert!(!MachineError::NotConnected.is_connection_error());
            assert!(!MachineError::Transport("x".into()).is_connection_error());
        }

        #[test]
        fn test_exit_codes_are_non_zero() {
            let errors = [
                MachineError::InvalidConfig("x".into()),
                MachineError::NotConnected,
                MachineError::ResourceNotFound("x".into()),
                MachineError::InvalidPayload("x".into()),
                MachineError::Transport("x".into()),
                MachineError::Io(std::io::Error::other("x")),
                MachineError::Cancelled,
            ];
            for err in errors {
                assert_ne!(err.exit_code(), 0, "{} must exit non-zero", err.kind());
            }
        }
    }

    mod display {
        use super::*;

        #[test]
        fn test_remote_execution_with_code() {
            let err = MachineError::RemoteExecution {
                code: Some(12),
                message: "DoCommand unimplemented".into(),
            };
            assert_eq!(
                err.to_string(),
                "remote execution failed (code 12): DoCommand unimplemented"
            );
        }

        #[test]
        fn test_remote_execution_without_code() {
            let err = MachineError::RemoteExecution {
                code: None,
                message: "boom".into(),
            };
            assert_eq!(err.to_string(), "remote execution failed: boom");
        }

        #[test]
        fn test_kind_mismatch() {
            let err = MachineError::KindMismatch {
                name: "detector-1".into(),
                expected: "camera".into(),
                actual: "vision".into(),
            };
            assert_eq!(
                err.to_string(),
                "resource 'detector-1' is a vision, expected a camera"
            );
        }
    }
}
