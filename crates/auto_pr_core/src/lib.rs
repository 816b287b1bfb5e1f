//! # Auto PR Core
//!
//! Core workflow for the auto PR creator: a tool that pushes a branch of automated
//! changes to a GitHub repository, opens a pull request for it, merges it and reports
//! the result to Discord and Slack.
//!
//! ## Overview
//!
//! A run goes through these steps:
//! 1. Load the JSON configuration and the secrets (token and webhook URLs)
//! 2. Create a uniquely named branch in the local repository
//! 3. Modify and commit the configured files, or simulate commits from several collaborators
//! 4. Push the branch
//! 5. Open, label and merge a pull request through the GitHub REST API
//! 6. Send a notification to every configured chat channel
//!
//! Any failure ends the run and is reported once as an error notification.
//!
//! ## Examples
//!
//! ```no_run
//! use std::path::Path;
//! use auto_pr_core::{AutoPrCreator, LayeredSecretResolver, RunOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = LayeredSecretResolver::environment_with_file(Path::new(".env"));
//! let creator = AutoPrCreator::initialize(Path::new("config/config.json"), &resolver)?;
//!
//! let outcome = creator.run(&RunOptions::default()).await;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod branch;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod git;
pub mod notifications;
pub mod orchestrator;
pub mod secrets;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AppConfig, Identity, DEFAULT_CONFIG_PATH};
pub use errors::{Error, NotificationError, Result};
pub use git::{GitRepository, VersionControl};
pub use notifications::{NotificationDispatcher, NotificationStatus};
pub use orchestrator::{AutoPrCreator, RunMode, RunOptions, RunOutcome};
pub use secrets::{
    DotEnvSecretResolver, EnvironmentSecretResolver, LayeredSecretResolver, SecretResolver,
    Secrets,
};
