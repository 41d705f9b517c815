//! Error types for the Discord channel.

use warden_broker::ChannelError;

/// Errors produced by the Discord REST client and Gateway listener.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    /// `WebSocket` transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Discord answered with an error status.
    #[error("Discord API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad base URL or path.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// `WebSocket` connection closed with a code.
    #[error("Connection closed with code {0}")]
    Closed(u16),

    /// Authentication failed (close code 4004 or HTTP 401).
    #[error("Authentication failed (close code 4004)")]
    AuthenticationFailed,

    /// Invalid intents configuration (close code 4013 or 4014).
    #[error("Invalid intents configuration (close code {0})")]
    InvalidIntents(u16),

    /// Unrecoverable close code from Discord.
    #[error("Unrecoverable close code: {0}")]
    UnrecoverableClose(u16),

    /// Shutdown was requested.
    #[error("Shutdown requested")]
    Shutdown,

    /// The Gateway did not send a Hello payload in time.
    #[error("Timed out waiting for Hello from Gateway")]
    HelloTimeout,

    /// Protocol violation from the Gateway.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<DiscordError> for ChannelError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::Api {
                status: 404,
                message,
            } => ChannelError::NotFound(message),
            DiscordError::Api { status, message } => ChannelError::Rejected { status, message },
            DiscordError::AuthenticationFailed => ChannelError::Rejected {
                status: 401,
                message: err.to_string(),
            },
            other => ChannelError::Transport(other.to_string()),
        }
    }
}

/// Result type for Discord operations.
pub type DiscordResult<T> = Result<T, DiscordError>;
