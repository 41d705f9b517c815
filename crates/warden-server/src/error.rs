//! Error types for the broker service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use warden_broker::{BrokerError, ChannelError};
use warden_config::ConfigError;
use warden_discord::DiscordError;

/// Errors from startup and request handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Broker rejected or failed a request.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The Discord client could not be built.
    #[error("Discord error: {0}")]
    Discord(#[from] DiscordError),

    /// The request body was not valid JSON for the endpoint.
    #[error("malformed request: {0}")]
    BadBody(String),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ChannelError> for ServerError {
    fn from(err: ChannelError) -> Self {
        Self::Broker(BrokerError::ChannelUnavailable(err))
    }
}

/// Result type for the service.
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadBody(_)
            | Self::Broker(BrokerError::MalformedRequest(_) | BrokerError::DuplicateRequest(_)) => {
                StatusCode::BAD_REQUEST
            },
            Self::Broker(BrokerError::Shutdown) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
