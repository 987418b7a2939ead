//! Error taxonomy shared by the client, the daemon, and the MCP layer.
//!
//! Callers branch on the variant, so this is a typed enum rather than an
//! opaque `anyhow::Error`. The same kinds travel over the wire in
//! [`DaemonResponse::Error`](crate::protocol::DaemonResponse) responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable wire tag for an error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced terminal id does not exist in Configuration/State.
    NotFound,
    /// Creation attempted with an id or name that already exists.
    Conflict,
    /// Daemon socket not connectable; no live session management possible.
    Unreachable,
    /// Request sent, no response within the bounded window. The effect on
    /// the daemon side is unknown, not presumed failed.
    Timeout,
    /// Caller-supplied arguments fail validation.
    Invalid,
    /// Anything else: I/O failure, malformed on-disk JSON, protocol drift.
    Internal,
}

/// Error surface of every control-plane operation.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("terminal not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("daemon unreachable at {0} — is the application running?")]
    Unreachable(String),

    #[error("daemon did not respond to {0} within {1} ms; its effect is unknown")]
    Timeout(&'static str, u64),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("{0}")]
    Internal(String),
}

impl ControlError {
    /// The wire tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::NotFound(_) => ErrorKind::NotFound,
            ControlError::Conflict(_) => ErrorKind::Conflict,
            ControlError::Unreachable(_) => ErrorKind::Unreachable,
            ControlError::Timeout(..) => ErrorKind::Timeout,
            ControlError::Invalid(_) => ErrorKind::Invalid,
            ControlError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Reconstruct an error received over the wire.
    ///
    /// `Unreachable`/`Timeout` never originate on the daemon side, but a
    /// forwarding layer may echo them; the message is kept verbatim either
    /// way.
    pub fn from_wire(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotFound => ControlError::NotFound(message),
            ErrorKind::Conflict => ControlError::Conflict(message),
            ErrorKind::Unreachable => ControlError::Unreachable(message),
            ErrorKind::Timeout => ControlError::Internal(message),
            ErrorKind::Invalid => ControlError::Invalid(message),
            ErrorKind::Internal => ControlError::Internal(message),
        }
    }
}

impl From<std::io::Error> for ControlError {
    fn from(e: std::io::Error) -> Self {
        ControlError::Internal(format!("IO error: {}", e))
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(e: serde_json::Error) -> Self {
        ControlError::Internal(format!("JSON error: {}", e))
    }
}

/// Result alias used throughout the control plane.
pub type ControlResult<T> = Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(
            ControlError::NotFound("t-1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ControlError::Timeout("send_input", 5000).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ControlError::Unreachable("/tmp/x.sock".into()).kind(),
            ErrorKind::Unreachable
        );
    }

    #[test]
    fn wire_round_trip_preserves_message() {
        let err = ControlError::Conflict("terminal id 't-3' already exists".into());
        let rebuilt = ControlError::from_wire(err.kind(), err.to_string());
        assert_eq!(rebuilt.kind(), ErrorKind::Conflict);
        assert!(rebuilt.to_string().contains("t-3"));
    }

    #[test]
    fn unreachable_message_names_the_fix() {
        let err = ControlError::Unreachable("/run/helmsman/daemon.sock".into());
        assert!(err.to_string().contains("is the application running?"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
