//! # Models
//!
//! Data models for the pull request endpoints of the GitHub REST API.
//!
//! Only the fields the automation reads are modelled. Everything else in the
//! GitHub payloads is ignored during deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// A GitHub account as it appears on pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    /// The login name of the account
    pub login: String,
}

/// One side (head or base) of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequestBranch {
    /// The branch name
    #[serde(rename = "ref")]
    pub ref_name: String,

    /// The commit the branch pointed at when the payload was produced
    #[serde(default)]
    pub sha: Option<String>,
}

/// Represents a GitHub pull request.
///
/// The `merged` flag is absent from list responses and defaults to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequest {
    /// The pull request number
    pub number: u64,

    /// The title of the pull request
    pub title: String,

    /// The description of the pull request
    #[serde(default)]
    pub body: Option<String>,

    /// The browser URL of the pull request
    pub html_url: String,

    /// `open` or `closed`
    pub state: String,

    /// Whether the pull request has been merged
    #[serde(default)]
    pub merged: bool,

    /// Whether the pull request is a draft
    #[serde(default)]
    pub draft: bool,

    /// The source branch
    pub head: PullRequestBranch,

    /// The target branch
    pub base: PullRequestBranch,

    /// The account that opened the pull request
    #[serde(default)]
    pub user: Option<User>,
}

impl PullRequest {
    /// Login of the pull request author, if GitHub reported one.
    pub fn author_login(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }
}

/// A label attached to an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The name of the label
    pub name: String,
}

/// The strategy used when merging a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    #[default]
    Squash,
    /// Rebase the commits onto the base branch
    Rebase,
}

impl MergeMethod {
    /// The value GitHub expects in the `merge_method` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merge" => Ok(MergeMethod::Merge),
            "squash" => Ok(MergeMethod::Squash),
            "rebase" => Ok(MergeMethod::Rebase),
            other => Err(format!(
                "unknown merge method '{other}', expected one of merge, squash, rebase"
            )),
        }
    }
}

/// The response of the merge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MergeResult {
    /// Whether the merge happened
    pub merged: bool,

    /// SHA of the resulting commit
    #[serde(default)]
    pub sha: Option<String>,

    /// Message returned by GitHub
    #[serde(default)]
    pub message: String,
}

/// Filter used when listing pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
    All,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "open",
            PullRequestState::Closed => "closed",
            PullRequestState::All => "all",
        }
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreatePullRequestPayload<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
    pub draft: bool,
}

/// Body of `PUT /repos/{owner}/{repo}/pulls/{number}/merge`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct MergePullRequestPayload {
    pub merge_method: MergeMethod,
    pub commit_title: String,
}

/// Body of `POST /repos/{owner}/{repo}/issues/{number}/labels`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AddLabelsPayload<'a> {
    pub labels: &'a [String],
}
