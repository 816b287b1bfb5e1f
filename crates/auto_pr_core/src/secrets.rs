//! Secret resolution for the GitHub token and webhook URLs.
//!
//! Secrets never come from the JSON configuration. They are looked up in the process
//! environment and, for local development, in a dotenv style file. The file is read
//! into a resolver of its own and is never merged into the process environment.

use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;

/// Name of the API token variable. Required.
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// Name of the Discord webhook URL variable. Optional.
pub const DISCORD_WEBHOOK: &str = "DISCORD_WEBHOOK";

/// Name of the Slack webhook URL variable. Optional.
pub const SLACK_WEBHOOK: &str = "SLACK_WEBHOOK";

/// Error type for secret resolution failures.
///
/// Does not include secret values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretResolutionError {
    #[error("Secret not found: {reference}")]
    NotFound { reference: String },

    #[error("Secret resolution error: {message}")]
    Other { message: String },
}

/// Resolves a secret name to its value.
///
/// Implementations must not log secret values.
pub trait SecretResolver: Send + Sync {
    fn resolve_secret(&self, secret_ref: &str) -> std::result::Result<String, SecretResolutionError>;
}

/// Resolves secrets from environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentSecretResolver;

impl EnvironmentSecretResolver {
    pub fn new() -> Self {
        Self
    }
}

impl SecretResolver for EnvironmentSecretResolver {
    fn resolve_secret(&self, secret_ref: &str) -> std::result::Result<String, SecretResolutionError> {
        std::env::var(secret_ref).map_err(|e| match e {
            std::env::VarError::NotPresent => SecretResolutionError::NotFound {
                reference: secret_ref.to_string(),
            },
            std::env::VarError::NotUnicode(_) => SecretResolutionError::Other {
                message: format!("{secret_ref} is not valid unicode"),
            },
        })
    }
}

/// Resolves secrets from `KEY=VALUE` lines of a dotenv file.
///
/// Blank lines and lines starting with `#` are skipped. An `export ` prefix, a pair
/// of matching quotes around the value and an inline ` # comment` are removed.
#[derive(Debug, Default, Clone)]
pub struct DotEnvSecretResolver {
    values: HashMap<String, String>,
}

impl DotEnvSecretResolver {
    /// Reads a dotenv file. A missing file yields an empty resolver.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let resolver = Self::parse(&content);
                debug!(
                    path = %path.display(),
                    entries = resolver.values.len(),
                    "Loaded environment file"
                );
                resolver
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No environment file found");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to read environment file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), parse_value(value.trim()).to_string());
        }
        Self { values }
    }
}

/// Unquotes a value, dropping a trailing ` # comment`.
///
/// Inside quotes `#` is literal. In an unquoted value a comment starts at a `#`
/// preceded by whitespace.
fn parse_value(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return &rest[..end];
            }
        }
    }

    let mut previous = None;
    for (index, c) in value.char_indices() {
        if c == '#' && previous.map_or(true, char::is_whitespace) {
            return value[..index].trim_end();
        }
        previous = Some(c);
    }
    value
}

impl SecretResolver for DotEnvSecretResolver {
    fn resolve_secret(&self, secret_ref: &str) -> std::result::Result<String, SecretResolutionError> {
        self.values
            .get(secret_ref)
            .cloned()
            .ok_or_else(|| SecretResolutionError::NotFound {
                reference: secret_ref.to_string(),
            })
    }
}

/// Tries each resolver in order and returns the first value found.
pub struct LayeredSecretResolver {
    layers: Vec<Box<dyn SecretResolver>>,
}

impl LayeredSecretResolver {
    pub fn new(layers: Vec<Box<dyn SecretResolver>>) -> Self {
        Self { layers }
    }

    /// The process environment, then the given dotenv file.
    pub fn environment_with_file(path: &Path) -> Self {
        Self::new(vec![
            Box::new(EnvironmentSecretResolver::new()),
            Box::new(DotEnvSecretResolver::from_file(path)),
        ])
    }
}

impl SecretResolver for LayeredSecretResolver {
    fn resolve_secret(&self, secret_ref: &str) -> std::result::Result<String, SecretResolutionError> {
        for layer in &self.layers {
            match layer.resolve_secret(secret_ref) {
                Ok(value) => return Ok(value),
                Err(SecretResolutionError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SecretResolutionError::NotFound {
            reference: secret_ref.to_string(),
        })
    }
}

/// The secrets a run needs.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub github_token: SecretString,
    pub discord_webhook: Option<String>,
    pub slack_webhook: Option<String>,
}

impl Secrets {
    /// Resolves the token and webhook URLs.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingCredential` when the token is unset or empty.
    pub fn load(resolver: &dyn SecretResolver) -> Result<Self> {
        let github_token = optional_secret(resolver, GITHUB_TOKEN).ok_or_else(|| {
            Error::MissingCredential {
                name: GITHUB_TOKEN.to_string(),
            }
        })?;

        let discord_webhook = optional_secret(resolver, DISCORD_WEBHOOK);
        if discord_webhook.is_none() {
            info!("{} not set, Discord notifications disabled", DISCORD_WEBHOOK);
        }
        let slack_webhook = optional_secret(resolver, SLACK_WEBHOOK);
        if slack_webhook.is_none() {
            info!("{} not set, Slack notifications disabled", SLACK_WEBHOOK);
        }

        Ok(Self {
            github_token: SecretString::from(github_token),
            discord_webhook,
            slack_webhook,
        })
    }
}

fn optional_secret(resolver: &dyn SecretResolver, name: &str) -> Option<String> {
    match resolver.resolve_secret(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Ok(_) => None,
        Err(SecretResolutionError::NotFound { .. }) => None,
        Err(e) => {
            warn!(secret = name, "Failed to resolve secret: {}", e);
            None
        }
    }
}
