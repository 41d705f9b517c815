//! Logging setup errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why logging could not be set up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level or directive is not valid filter syntax.
    #[error("invalid log filter {0}")]
    InvalidFilter(String),

    /// A log format name is not recognised.
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),

    /// The log file or its directory cannot be used.
    #[error("cannot log to {}: {reason}", path.display())]
    LogFile {
        /// The configured file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Another subscriber was installed first.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result type for logging setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
