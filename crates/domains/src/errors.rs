//! # Errors
//!
//! Failure taxonomy shared by the gateway, the push channel and the screens.

use thiserror::Error;

/// Failure of a single HTTP exchange.
///
/// Network and status failures are treated the same way by the fallback
/// layer; the distinction only matters for logging.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No response at all (refused, DNS, reset, ...)
    #[error("network error: {0}")]
    Network(String),

    /// The configured timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status
    #[error("server responded with status {status}")]
    Status { status: u16, body: String },

    /// The request could not be built or serialized
    #[error("request encoding failed: {0}")]
    Encode(String),
}

impl TransportError {
    /// HTTP status if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of the push-notification channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PushError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("channel closed")]
    Closed,
}

/// The primary error type for gateway and screen operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Transport failure that no fallback absorbed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Entity absent from a list-backed lookup
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Input rejected before any network call
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Response body did not match the expected shape
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// A specialized Result type for dashboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
