//! Shared error type across Stark crates.

use thiserror::Error;

/// Stable error codes, suitable for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input (bad config, bad argument).
    BadRequest,
    /// Envelope misses a mandatory field.
    InvalidEnvelope,
    /// Frame could not be decoded as an envelope.
    Decode,
    /// `connect` called while a channel is connecting or open.
    AlreadyConnected,
    /// The client worker is gone.
    ClientClosed,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InvalidEnvelope => "INVALID_ENVELOPE",
            ErrorCode::Decode => "DECODE",
            ErrorCode::AlreadyConnected => "ALREADY_CONNECTED",
            ErrorCode::ClientClosed => "CLIENT_CLOSED",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, StarkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum StarkError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(&'static str),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("channel already connecting or open")]
    AlreadyConnected,
    #[error("client closed")]
    ClientClosed,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl StarkError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            StarkError::BadRequest(_) => ErrorCode::BadRequest,
            StarkError::InvalidEnvelope(_) => ErrorCode::InvalidEnvelope,
            StarkError::Decode(_) => ErrorCode::Decode,
            StarkError::AlreadyConnected => ErrorCode::AlreadyConnected,
            StarkError::ClientClosed => ErrorCode::ClientClosed,
            StarkError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            StarkError::Internal(_) => ErrorCode::Internal,
        }
    }
}
