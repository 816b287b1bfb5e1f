//! Error types for GitHub client operations.
//!
//! This module defines the error types that can occur when talking to the GitHub REST API
//! through the github_client crate.

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur during GitHub client operations.
///
/// ## Examples
///
/// ```rust,ignore
/// use github_client::Error;
///
/// match client.merge_pull_request(42, MergeMethod::Squash).await {
///     Ok(result) => println!("Merged: {}", result.merged),
///     Err(Error::ApiRequest { status: Some(405), message }) => eprintln!("Not mergeable: {message}"),
///     Err(err) => eprintln!("Other error: {err}"),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An API request failed after the retry budget was used up, or with a
    /// status that is never retried.
    ///
    /// `status` is `None` when no HTTP response was received (connection failure,
    /// timeout). `message` includes the `message` field of the GitHub error body
    /// when one was returned.
    #[error("GitHub API request failed{}: {message}", status_suffix(.status))]
    ApiRequest {
        /// HTTP status of the last response, if any.
        status: Option<u16>,
        /// Human readable description of the failure.
        message: String,
    },

    /// The client was constructed with invalid settings.
    ///
    /// This error occurs when the owner or repository name is empty, the API URL
    /// cannot be parsed, or the HTTP client cannot be built.
    #[error("Invalid GitHub client configuration: {0}")]
    Configuration(String),

    /// Error deserializing the response from GitHub.
    ///
    /// This error occurs when the GitHub API returns a response that cannot be
    /// parsed into the expected data structure.
    #[error("Failed to deserialize GitHub response: {0}")]
    Deserialization(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl Error {
    /// Returns the HTTP status of a failed API request, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiRequest { status, .. } => *status,
            _ => None,
        }
    }
}
