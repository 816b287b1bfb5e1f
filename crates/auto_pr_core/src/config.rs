//! Configuration for the auto PR workflow.
//!
//! The configuration is a JSON document. The `github` and `files` sections are
//! required; every other section is optional and falls back to the defaults
//! documented on the accessors of [`AppConfig`].
//!
//! ```json
//! {
//!   "github": {
//!     "repository": { "owner": "acme", "name": "widgets", "default_branch": "main" },
//!     "merge": { "method": "squash" }
//!   },
//!   "files": { "to_modify": ["README.md"] },
//!   "coauthor": { "name": "Jane Doe", "email": "jane@example.com" },
//!   "pull_request": { "title": "Nightly refresh", "labels": ["automated"] }
//! }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use github_client::{MergeMethod, RetryPolicy, DEFAULT_API_URL, DEFAULT_BASE_BRANCH};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Default location of the pull request body template.
pub const DEFAULT_TEMPLATE_PATH: &str = "templates/pr_template.md";

/// Labels applied when the configuration does not name any.
pub const DEFAULT_LABEL: &str = "automated";

/// Maximum branch name length when none is configured.
pub const DEFAULT_BRANCH_MAX_LENGTH: usize = 50;

/// Display name used for chat notifications.
pub const DEFAULT_NOTIFICATION_USERNAME: &str = "Auto PR Creator";

/// Avatar used for Discord notifications.
pub const DEFAULT_NOTIFICATION_AVATAR: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

/// A git identity: the author of a commit or a co-author named in a trailer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The repository pull requests are opened against.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepositorySettings {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub default_branch: Option<String>,
}

impl RepositorySettings {
    /// The base branch, `main` unless configured.
    pub fn default_branch(&self) -> &str {
        self.default_branch
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_BRANCH)
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MergeSettings {
    #[serde(default)]
    pub method: Option<MergeMethod>,
}

/// Transport retry settings for the GitHub API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Also retry POST, PUT and DELETE requests. Off by default because a
    /// retried create or merge may be applied twice.
    #[serde(default)]
    pub retry_non_idempotent: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_non_idempotent: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitHubSettings {
    #[serde(default)]
    pub repository: RepositorySettings,

    #[serde(default)]
    pub merge: Option<MergeSettings>,

    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileSettings {
    #[serde(default)]
    pub to_modify: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoAuthorSettings {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Chat notification settings. Webhook URLs are secrets and live in the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub notify_on_error: bool,

    #[serde(default = "default_notification_username")]
    pub username: String,

    #[serde(default = "default_notification_avatar")]
    pub avatar_url: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_on_error: true,
            username: default_notification_username(),
            avatar_url: default_notification_avatar(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PullRequestSettings {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[serde(default)]
    pub template_path: Option<PathBuf>,

    #[serde(default)]
    pub draft: bool,
}

/// Local repository settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitSettings {
    #[serde(default = "default_repository_path")]
    pub repository_path: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Author of single-mode commits. Falls back to the git configuration.
    #[serde(default)]
    pub author: Option<Identity>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            repository_path: default_repository_path(),
            remote: default_remote(),
            author: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BranchSettings {
    #[serde(default = "default_branch_max_length")]
    pub max_length: usize,
}

impl Default for BranchSettings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_BRANCH_MAX_LENGTH,
        }
    }
}

/// Settings for collaborator mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaborationSettings {
    #[serde(default = "default_commits_per_collaborator")]
    pub commits_per_collaborator: u32,

    #[serde(default = "default_collaborators")]
    pub collaborators: Vec<Identity>,
}

impl Default for CollaborationSettings {
    fn default() -> Self {
        Self {
            commits_per_collaborator: default_commits_per_collaborator(),
            collaborators: default_collaborators(),
        }
    }
}

/// The loaded configuration. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub github: GitHubSettings,

    pub files: FileSettings,

    #[serde(default)]
    pub coauthor: Option<CoAuthorSettings>,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub pull_request: PullRequestSettings,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub branch: BranchSettings,

    #[serde(default)]
    pub collaboration: CollaborationSettings,
}

impl AppConfig {
    /// Loads and validates configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// * `Error::ConfigNotFound` - the file does not exist
    /// * `Error::ConfigParse` - the file cannot be read, is not JSON, or has values of the wrong type
    /// * `Error::ConfigValidation` - a required section or the repository owner/name is missing
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);

        if !path.exists() {
            error!("Configuration file not found: {:?}", path);
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: format!("failed to read file: {e}"),
        })?;

        let config = Self::from_json(&content).map_err(|e| match e {
            Error::ConfigParse { message, .. } => Error::ConfigParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        info!(
            path = %path.display(),
            repository = %config.github.repository.full_name(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        let parse_error = |e: serde_json::Error| Error::ConfigParse {
            path: PathBuf::new(),
            message: e.to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(content).map_err(parse_error)?;
        let Some(object) = value.as_object() else {
            return Err(Error::ConfigValidation(
                "configuration must be a JSON object".to_string(),
            ));
        };

        for section in ["github", "files"] {
            if object.get(section).map_or(true, serde_json::Value::is_null) {
                return Err(Error::ConfigValidation(format!(
                    "missing required section: {section}"
                )));
            }
        }

        let config: AppConfig = serde_json::from_value(value).map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let repository = &self.github.repository;
        if repository.owner.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "github.repository.owner must be set".to_string(),
            ));
        }
        if repository.name.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "github.repository.name must be set".to_string(),
            ));
        }
        if self.branch.max_length == 0 {
            return Err(Error::ConfigValidation(
                "branch.max_length must be greater than zero".to_string(),
            ));
        }
        if self.collaboration.commits_per_collaborator == 0 {
            return Err(Error::ConfigValidation(
                "collaboration.commits_per_collaborator must be greater than zero".to_string(),
            ));
        }
        if self.collaboration.collaborators.is_empty() {
            return Err(Error::ConfigValidation(
                "collaboration.collaborators must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn repository(&self) -> &RepositorySettings {
        &self.github.repository
    }

    /// The `github.merge.method` value, if set.
    pub fn merge_method(&self) -> Option<MergeMethod> {
        self.github.merge.as_ref().and_then(|m| m.method)
    }

    /// The configured merge method, or `fallback` when none is set.
    pub fn merge_method_or(&self, fallback: MergeMethod) -> MergeMethod {
        self.merge_method().unwrap_or(fallback)
    }

    pub fn files_to_modify(&self) -> &[String] {
        &self.files.to_modify
    }

    /// The co-author for single-mode commits, if one is configured and enabled.
    pub fn coauthor(&self) -> Option<Identity> {
        self.coauthor
            .as_ref()
            .filter(|c| c.enabled && !c.name.trim().is_empty() && !c.email.trim().is_empty())
            .map(|c| Identity::new(c.name.trim(), c.email.trim()))
    }

    pub fn pr_title(&self) -> Option<&str> {
        self.pull_request.title.as_deref()
    }

    /// Labels for new pull requests, `["automated"]` unless configured.
    pub fn pr_labels(&self) -> Vec<String> {
        self.pull_request
            .labels
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_LABEL.to_string()])
    }

    pub fn pr_template_path(&self) -> PathBuf {
        self.pull_request
            .template_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH))
    }

    pub fn pr_draft(&self) -> bool {
        self.pull_request.draft
    }

    pub fn api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.github.retry;
        RetryPolicy {
            max_retries: retry.max_retries,
            backoff_base: Duration::from_millis(retry.backoff_base_ms),
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
            retry_non_idempotent: retry.retry_non_idempotent,
            ..RetryPolicy::default()
        }
    }

    pub fn repository_path(&self) -> &Path {
        &self.git.repository_path
    }

    pub fn remote(&self) -> &str {
        &self.git.remote
    }

    pub fn commit_author(&self) -> Option<&Identity> {
        self.git.author.as_ref()
    }

    pub fn branch_max_length(&self) -> usize {
        self.branch.max_length
    }

    pub fn commits_per_collaborator(&self) -> u32 {
        self.collaboration.commits_per_collaborator
    }

    pub fn collaborators(&self) -> &[Identity] {
        &self.collaboration.collaborators
    }

    pub fn notification_settings(&self) -> &NotificationSettings {
        &self.notifications
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_notification_username() -> String {
    DEFAULT_NOTIFICATION_USERNAME.to_string()
}

fn default_notification_avatar() -> String {
    DEFAULT_NOTIFICATION_AVATAR.to_string()
}

fn default_repository_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch_max_length() -> usize {
    DEFAULT_BRANCH_MAX_LENGTH
}

fn default_commits_per_collaborator() -> u32 {
    2
}

fn default_collaborators() -> Vec<Identity> {
    vec![
        Identity::new("Alice Developer", "alice.developer@users.noreply.github.com"),
        Identity::new("Bob Reviewer", "bob.reviewer@users.noreply.github.com"),
    ]
}
