//! Classifier error types.

use thiserror::Error;

/// Errors raised while building rules or querying a repository.
///
/// Git errors never escape [`crate::RiskClassifier::classify`]; they are
/// folded into a "not recoverable" finding.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// A pattern rule did not compile.
    #[error("invalid pattern for rule '{name}': {source}")]
    InvalidPattern {
        /// Rule name.
        name: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The version-control tool could not be run.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The version-control tool ran but reported a failure.
    #[error("{program} exited with {status}: {stderr}")]
    Git {
        /// Program that failed.
        program: String,
        /// Exit status text.
        status: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// Filesystem inspection failed for a reason other than absence.
    #[error("cannot inspect {path}: {source}")]
    Inspect {
        /// Path being inspected.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;
