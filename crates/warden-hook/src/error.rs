//! Error types for the hook.

use thiserror::Error;

/// Errors inside the hook. None of them reach the agent: the hook falls
/// through to native handling instead.
#[derive(Debug, Error)]
pub enum HookError {
    /// The envelope on stdin was not valid JSON.
    #[error("invalid hook input: {0}")]
    Input(#[from] serde_json::Error),

    /// Reading stdin or spawning a helper failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The broker could not be reached or timed out.
    #[error("broker unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The broker answered with an error status.
    #[error("broker returned {status}: {message}")]
    Broker {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] warden_config::ConfigError),

    /// The rule set failed to compile.
    #[error("classifier error: {0}")]
    Classifier(#[from] warden_classifier::ClassifierError),

    /// The classifier task panicked or was cancelled.
    #[error("classifier task failed: {0}")]
    Join(String),
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;
