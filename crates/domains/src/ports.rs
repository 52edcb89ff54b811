//! # Ports
//!
//! Any adapter must implement these traits to be wired into the dashboard.

use async_trait::async_trait;

use crate::errors::{PushError, TransportError};
use crate::events::PushEvent;
use crate::http::{ApiRequest, ApiResponse};
use crate::models::CallerRole;

/// Executes one HTTP exchange against the remote API.
///
/// Implementations return `Err(TransportError::Status)` for non-2xx answers
/// so that every failure reaches the interceptor chain the same way.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Produces the headers asserting a caller role.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    fn headers_for(&self, role: CallerRole) -> Vec<(String, String)>;
}

/// Opens push-notification sessions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Performs the full handshake; the returned stream is ready to yield events.
    async fn connect(&self) -> Result<Box<dyn PushStream>, PushError>;
}

/// One live push session.
#[async_trait]
pub trait PushStream: Send {
    /// Next event, `Some(Err(_))` on a recoverable protocol hiccup, `None`
    /// once the server has gone away.
    async fn next_event(&mut self) -> Option<Result<PushEvent, PushError>>;

    /// Closes the session. Must be safe to call more than once.
    async fn close(&mut self);
}
