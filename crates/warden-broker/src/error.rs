//! Broker error types.

use thiserror::Error;
use warden_core::RequestId;

/// Errors raised by a [`NotificationChannel`](crate::NotificationChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is not connected yet, or has lost its connection.
    #[error("channel not ready")]
    NotReady,

    /// The destination or thread does not exist or is not accessible.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform rejected the call.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Platform error text.
        message: String,
    },

    /// Network or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur in the approval broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The request is unusable (e.g. no correlation id).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A request with this id is already pending.
    #[error("request {0} is already pending")]
    DuplicateRequest(RequestId),

    /// The notification channel cannot carry the prompt.
    #[error("notification channel unavailable: {0}")]
    ChannelUnavailable(#[from] ChannelError),

    /// The request was already resolved or never existed.
    #[error("request {0} has expired")]
    Expired(RequestId),

    /// Terminal injection failed.
    #[error("terminal injection failed: {0}")]
    Terminal(String),

    /// The broker is shutting down.
    #[error("broker shutting down")]
    Shutdown,
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
