//! Error types for the auto PR workflow.
//!
//! Configuration and credential errors are raised while the workflow is being set up,
//! before anything is changed. Version control and API errors abort a run in progress.
//! Notification failures never surface as an [`Error`]; they are reported through
//! [`NotificationError`] inside a delivery result instead.

use std::path::PathBuf;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that stop the auto PR workflow.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// The configuration file could not be read or is not valid JSON.
    #[error("Failed to parse configuration file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// The configuration parsed but is missing required content.
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// A required secret is not set.
    #[error("Missing required credential: {name}")]
    MissingCredential { name: String },

    /// A local git operation failed.
    #[error("Git operation failed: {0}")]
    VcsOperation(String),

    /// A GitHub API call failed.
    #[error(transparent)]
    Api(#[from] github_client::Error),
}

impl Error {
    /// Short name of the error kind, used in error notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigNotFound { .. } => "ConfigNotFound",
            Error::ConfigParse { .. } => "ConfigParseError",
            Error::ConfigValidation(_) => "ConfigValidationError",
            Error::MissingCredential { .. } => "MissingCredential",
            Error::VcsOperation(_) => "VcsOperationError",
            Error::Api(github_client::Error::Configuration(_)) => "ConfigurationError",
            Error::Api(_) => "ApiRequestError",
        }
    }

    /// Returns true for errors raised while loading configuration or secrets.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation(_)
                | Error::MissingCredential { .. }
                | Error::Api(github_client::Error::Configuration(_))
        )
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A webhook delivery that did not succeed.
///
/// These are logged and recorded, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The request could not be sent or timed out.
    #[error("Failed to deliver notification to {channel}: {message}")]
    Transport { channel: String, message: String },

    /// The webhook answered with a non-success status.
    #[error("{channel} webhook returned status {status}")]
    Rejected { channel: String, status: u16 },
}
