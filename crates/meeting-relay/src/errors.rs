//! Meeting Relay error types.
//!
//! Join/admit/leave/end rejections are expected business outcomes: they are
//! carried back to the originating connection as an error event and never
//! close the connection. Internal details (store faults, channel failures)
//! are logged server-side but not exposed to clients.

use thiserror::Error;

/// Meeting Relay error type.
///
/// Maps to wire `error_code` values:
/// - `Forbidden`: 3
/// - `NotFound`: 4
/// - `AlreadyJoined`: 5 (conflict)
/// - `Store`, `Internal`: 6
/// - `CapacityExceeded`, `Draining`: 7
/// - `InvalidState`: 9
/// - `MissingCredential`, `InvalidCredential`: 2
/// - `Validation`: 1
#[derive(Debug, Error)]
pub enum RelayError {
    /// Meeting or participant absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation attempted on a meeting in a terminal state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Non-host attempting a host-only action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Join password required but not supplied.
    #[error("Password required")]
    MissingCredential,

    /// Join password supplied but incorrect.
    #[error("Invalid password")]
    InvalidCredential,

    /// Meeting is at capacity (Joined count vs `max_participants`).
    #[error("Meeting at capacity: {0}")]
    CapacityExceeded(String),

    /// The user already holds an active (Joined) roster entry.
    #[error("Already joined: {0}")]
    AlreadyJoined(String),

    /// Malformed inbound payload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Meeting store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The relay is shutting down and not accepting new work.
    #[error("Relay is draining")]
    Draining,

    /// Internal error (actor channel failures and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the wire `error_code` value for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            RelayError::Validation(_) => 1,
            RelayError::MissingCredential | RelayError::InvalidCredential => 2,
            RelayError::Forbidden(_) => 3,
            RelayError::NotFound(_) => 4,
            RelayError::AlreadyJoined(_) => 5,
            RelayError::Store(_) | RelayError::Internal(_) => 6,
            RelayError::CapacityExceeded(_) | RelayError::Draining => 7,
            RelayError::InvalidState(_) => 9,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Store(_) | RelayError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            RelayError::Draining => "Server is shutting down, please reconnect".to_string(),
            RelayError::MissingCredential => "Password required".to_string(),
            RelayError::InvalidCredential => "Invalid password".to_string(),
            RelayError::NotFound(msg)
            | RelayError::InvalidState(msg)
            | RelayError::Forbidden(msg)
            | RelayError::CapacityExceeded(msg)
            | RelayError::AlreadyJoined(msg)
            | RelayError::Validation(msg) => msg.clone(),
        }
    }

    /// Returns the HTTP status code for this error (used by the meetings API).
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            RelayError::Validation(_) => 400,
            RelayError::MissingCredential | RelayError::InvalidCredential => 401,
            RelayError::Forbidden(_) => 403,
            RelayError::NotFound(_) => 404,
            RelayError::AlreadyJoined(_) | RelayError::InvalidState(_) => 409,
            RelayError::CapacityExceeded(_) | RelayError::Draining => 503,
            RelayError::Store(_) | RelayError::Internal(_) => 500,
        }
    }
}
