use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that end the CLI before a run starts.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid combination of command-line arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Loading the configuration or the secrets failed.
    ///
    /// Nothing has been changed locally or remotely when this is returned.
    #[error("Initialization failed: {0}")]
    Initialization(#[from] auto_pr_core::Error),
}
