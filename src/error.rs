// src/error.rs

use thiserror::Error;

/// Core error types for reprepro-bundle
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A suite could not be scanned or queried
    #[error("Repository suite '{suite}' unavailable: {reason}")]
    RepositoryUnavailable { suite: String, reason: String },

    /// The bundle has no resolvable own suite
    #[error("Own suite unavailable for bundle '{0}'")]
    OwnSuiteUnavailable(String),

    /// A reconciliation was requested without any suite to scan
    #[error("No supplier or reference suites given")]
    NoSuites,

    /// Bundle name doesn't follow <distribution>[/<number>]
    #[error("Invalid bundle name: {0}")]
    InvalidBundleName(String),

    /// Malformed configuration or index content
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Download failure
    #[error("Download error: {0}")]
    DownloadError(String),

    /// File I/O failure with context
    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// Wrap any failure of a suite operation as `RepositoryUnavailable`
    pub fn unavailable(suite: &str, reason: impl std::fmt::Display) -> Self {
        Error::RepositoryUnavailable {
            suite: suite.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
