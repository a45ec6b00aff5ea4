//! Shared error type across livebridge crates.

use thiserror::Error;

/// Stable error codes (used in logs, metrics labels, and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Send attempted without an active transport session.
    NotConnected,
    /// Inbound bytes could not be decoded.
    MalformedEnvelope,
    /// Reassembled asset exceeds the configured capacity.
    OversizedAsset,
    /// Transport rejected an outbound send.
    SendFailure,
    /// No response within the deadline.
    Timeout,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config or wire version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::OversizedAsset => "OVERSIZED_ASSET",
            ErrorCode::SendFailure => "SEND_FAILURE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    #[error("transport not connected")]
    NotConnected,
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("asset frame {frame_id} is {len} bytes, capacity is {capacity}")]
    OversizedAsset {
        frame_id: u32,
        len: usize,
        capacity: usize,
    },
    #[error("send failed: {0}")]
    SendFailure(String),
    #[error("timed out waiting for response")]
    Timeout,
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::NotConnected => ErrorCode::NotConnected,
            BridgeError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            BridgeError::OversizedAsset { .. } => ErrorCode::OversizedAsset,
            BridgeError::SendFailure(_) => ErrorCode::SendFailure,
            BridgeError::Timeout => ErrorCode::Timeout,
            BridgeError::BadConfig(_) => ErrorCode::BadConfig,
            BridgeError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            BridgeError::Internal(_) => ErrorCode::Internal,
        }
    }
}
