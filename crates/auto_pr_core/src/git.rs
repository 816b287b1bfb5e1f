//! Local Git repository operations.
//!
//! This module provides the branch, commit and push steps of the workflow using git2:
//! - Branch creation from `HEAD`
//! - Timestamped file updates
//! - Commits with an optional `Co-authored-by` trailer, or authored as a given identity
//! - Push operations authenticated with the API token
//!
//! For GitHub API operations see the `github_client` crate.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use git2::{Repository, Signature};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};

use crate::config::Identity;
use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;

const FALLBACK_AUTHOR_NAME: &str = "Auto PR Creator";
const FALLBACK_AUTHOR_EMAIL: &str = "auto-pr@users.noreply.github.com";

/// Version control steps used by the workflow.
///
/// Paths are relative to the repository working directory.
pub trait VersionControl: Send + Sync {
    /// Creates a branch from `HEAD` and checks it out.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Appends a timestamped update marker to each file, creating missing files.
    ///
    /// Returns the paths that were modified.
    fn modify_files(&self, paths: &[String]) -> Result<Vec<PathBuf>>;

    /// Stages `paths` and commits them with an `Automated update` message.
    ///
    /// When `coauthor` is given the message ends with a `Co-authored-by` trailer.
    /// Returns the id of the new commit.
    fn commit(&self, paths: &[PathBuf], coauthor: Option<&Identity>) -> Result<String>;

    /// Writes `contents` to `path`, creating parent directories.
    fn write_file(&self, path: &Path, contents: &str) -> Result<PathBuf>;

    /// Stages `paths` and commits them with `author` as author and committer.
    fn commit_as(&self, author: &Identity, paths: &[PathBuf], message: &str) -> Result<String>;

    /// Pushes `refs/heads/<branch>` to the configured remote.
    fn push(&self, branch: &str) -> Result<()>;
}

/// Builds the commit message for single mode.
pub fn commit_message(timestamp: &str, coauthor: Option<&Identity>) -> String {
    let mut message = format!("Automated update {timestamp}");
    if let Some(coauthor) = coauthor {
        message.push_str(&format!(
            "\n\nCo-authored-by: {} <{}>",
            coauthor.name, coauthor.email
        ));
    }
    message
}

/// A local clone operated on with git2.
///
/// The repository is opened for each operation.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
    remote: String,
    token: SecretString,
    author: Option<Identity>,
}

impl GitRepository {
    pub fn new(path: impl Into<PathBuf>, remote: impl Into<String>, token: SecretString) -> Self {
        Self {
            path: path.into(),
            remote: remote.into(),
            token,
            author: None,
        }
    }

    /// Sets the author of single-mode commits.
    pub fn with_author(mut self, author: Option<Identity>) -> Self {
        self.author = author;
        self
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.path).map_err(|e| {
            error!("Failed to open git repository at {:?}: {}", self.path, e);
            Error::VcsOperation(format!("Failed to open git repository: {}", e))
        })
    }

    fn workdir(repo: &Repository) -> Result<PathBuf> {
        repo.workdir().map(Path::to_path_buf).ok_or_else(|| {
            Error::VcsOperation("Repository has no working directory".to_string())
        })
    }

    fn default_signature(&self, repo: &Repository) -> Result<Signature<'static>> {
        if let Some(author) = &self.author {
            return signature_for(author);
        }
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(e) => {
                debug!("No git identity configured ({}), using fallback author", e);
                signature_for(&Identity::new(FALLBACK_AUTHOR_NAME, FALLBACK_AUTHOR_EMAIL))
            }
        }
    }

    fn commit_paths(
        &self,
        repo: &Repository,
        signature: &Signature<'_>,
        paths: &[PathBuf],
        message: &str,
    ) -> Result<String> {
        let workdir = Self::workdir(repo)?;
        let mut index = repo.index().map_err(|e| {
            error!("Failed to get repository index: {}", e);
            Error::VcsOperation(format!("Failed to get repository index: {}", e))
        })?;

        for path in paths {
            let relative = relative_path(&workdir, path)?;
            let staged = if workdir.join(&relative).exists() {
                index.add_path(&relative)
            } else {
                index.remove_path(&relative)
            };
            staged.map_err(|e| {
                error!("Failed to stage {:?}: {}", relative, e);
                Error::VcsOperation(format!("Failed to stage {}: {}", relative.display(), e))
            })?;
        }

        index.write().map_err(|e| {
            error!("Failed to write index: {}", e);
            Error::VcsOperation(format!("Failed to write index: {}", e))
        })?;

        let tree_oid = index.write_tree().map_err(|e| {
            error!("Failed to write tree: {}", e);
            Error::VcsOperation(format!("Failed to write tree: {}", e))
        })?;
        let tree = repo.find_tree(tree_oid).map_err(|e| {
            error!("Failed to find tree: {}", e);
            Error::VcsOperation(format!("Failed to find tree: {}", e))
        })?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(|e| {
                error!("Failed to resolve HEAD commit: {}", e);
                Error::VcsOperation(format!("Failed to resolve HEAD commit: {}", e))
            })?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let commit_oid = repo
            .commit(Some("HEAD"), signature, signature, message, &tree, &parents)
            .map_err(|e| {
                error!("Failed to create commit: {}", e);
                Error::VcsOperation(format!("Failed to create commit: {}", e))
            })?;

        info!(
            commit = %commit_oid,
            author = signature.name().unwrap_or(""),
            files = paths.len(),
            "Created commit"
        );
        Ok(commit_oid.to_string())
    }
}

impl VersionControl for GitRepository {
    fn create_branch(&self, name: &str) -> Result<()> {
        let repo = self.open()?;

        let head_commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| {
                error!("Failed to resolve HEAD: {}", e);
                Error::VcsOperation(format!("Failed to resolve HEAD: {}", e))
            })?;

        repo.branch(name, &head_commit, false).map_err(|e| {
            error!("Failed to create branch '{}': {}", name, e);
            Error::VcsOperation(format!("Failed to create branch '{}': {}", name, e))
        })?;

        let reference = format!("refs/heads/{name}");
        repo.set_head(&reference).map_err(|e| {
            error!("Failed to check out branch '{}': {}", name, e);
            Error::VcsOperation(format!("Failed to check out branch '{}': {}", name, e))
        })?;

        info!(branch = name, base = %head_commit.id(), "Created and checked out branch");
        Ok(())
    }

    fn modify_files(&self, paths: &[String]) -> Result<Vec<PathBuf>> {
        let repo = self.open()?;
        let workdir = Self::workdir(&repo)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let mut modified = Vec::with_capacity(paths.len());
        for path in paths {
            let relative = relative_path(&workdir, Path::new(path))?;
            let full_path = workdir.join(&relative);
            ensure_parent_dir(&full_path)?;

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&full_path)
                .map_err(|e| {
                    error!("Failed to open {:?}: {}", full_path, e);
                    Error::VcsOperation(format!("Failed to open {}: {}", relative.display(), e))
                })?;
            writeln!(file, "\n<!-- Last automated update: {timestamp} -->").map_err(|e| {
                error!("Failed to write {:?}: {}", full_path, e);
                Error::VcsOperation(format!("Failed to write {}: {}", relative.display(), e))
            })?;

            debug!(file = %relative.display(), "Modified file");
            modified.push(relative);
        }

        info!(count = modified.len(), "Modified files");
        Ok(modified)
    }

    fn commit(&self, paths: &[PathBuf], coauthor: Option<&Identity>) -> Result<String> {
        let repo = self.open()?;
        let signature = self.default_signature(&repo)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let message = commit_message(&timestamp, coauthor);

        if let Some(coauthor) = coauthor {
            debug!(coauthor = coauthor.name.as_str(), "Adding co-author trailer");
        }
        self.commit_paths(&repo, &signature, paths, &message)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<PathBuf> {
        let repo = self.open()?;
        let workdir = Self::workdir(&repo)?;
        let relative = relative_path(&workdir, path)?;
        let full_path = workdir.join(&relative);
        ensure_parent_dir(&full_path)?;

        fs::write(&full_path, contents).map_err(|e| {
            error!("Failed to write {:?}: {}", full_path, e);
            Error::VcsOperation(format!("Failed to write {}: {}", relative.display(), e))
        })?;
        Ok(relative)
    }

    fn commit_as(&self, author: &Identity, paths: &[PathBuf], message: &str) -> Result<String> {
        let repo = self.open()?;
        let signature = signature_for(author)?;
        self.commit_paths(&repo, &signature, paths, message)
    }

    fn push(&self, branch: &str) -> Result<()> {
        info!(remote = self.remote.as_str(), branch = branch, "Starting git push");

        let repo = self.open()?;
        let mut remote = repo.find_remote(&self.remote).map_err(|e| {
            error!("Failed to find remote '{}': {}", self.remote, e);
            Error::VcsOperation(format!("Failed to find remote '{}': {}", self.remote, e))
        })?;

        let mut callbacks = git2::RemoteCallbacks::new();
        let token = self.token.clone();
        callbacks.credentials(move |url, username_from_url, allowed_types| {
            debug!(
                "Git credential callback triggered - URL: {}, username: {:?}, allowed types: {:?}",
                url, username_from_url, allowed_types
            );
            if allowed_types.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                git2::Cred::userpass_plaintext("x-access-token", token.expose_secret())
            } else {
                error!(
                    "No supported credential types available. Allowed types: {:?}",
                    allowed_types
                );
                Err(git2::Error::from_str(
                    "No supported credential types for GitHub authentication",
                ))
            }
        });

        callbacks.push_update_reference(|refname, status| match status {
            Some(msg) => {
                error!("Reference update failed for '{}': {}", refname, msg);
                Err(git2::Error::from_str(&format!(
                    "Push reference update failed: {}",
                    msg
                )))
            }
            None => {
                debug!("Reference '{}' updated successfully", refname);
                Ok(())
            }
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote
            .push(&[&refspec], Some(&mut push_options))
            .map_err(|e| {
                error!(
                    "Git push failed (code: {:?}, class: {:?}): {}",
                    e.code(),
                    e.class(),
                    e.message()
                );
                let detail = match e.class() {
                    git2::ErrorClass::Net => {
                        format!("Network error during push: {}", e.message())
                    }
                    git2::ErrorClass::Http => {
                        format!("HTTP error during push: {}. Check the token permissions.", e.message())
                    }
                    git2::ErrorClass::Callback => {
                        format!("Authentication callback error: {}", e.message())
                    }
                    _ => format!("Git push failed: {}", e.message()),
                };
                Error::VcsOperation(detail)
            })?;

        info!(remote = self.remote.as_str(), branch = branch, "Pushed branch");
        Ok(())
    }
}

fn signature_for(identity: &Identity) -> Result<Signature<'static>> {
    Signature::now(&identity.name, &identity.email).map_err(|e| {
        error!("Invalid git identity '{}': {}", identity.name, e);
        Error::VcsOperation(format!("Invalid git identity '{}': {}", identity.name, e))
    })
}

fn ensure_parent_dir(full_path: &Path) -> Result<()> {
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            error!("Failed to create directory {:?}: {}", parent, e);
            Error::VcsOperation(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }
    Ok(())
}

/// Resolves `path` to a path relative to the working directory.
///
/// Paths that escape the working directory are rejected.
fn relative_path(workdir: &Path, path: &Path) -> Result<PathBuf> {
    let relative = if path.is_absolute() {
        path.strip_prefix(workdir)
            .map(Path::to_path_buf)
            .map_err(|_| {
                Error::VcsOperation(format!(
                    "{} is outside the repository",
                    path.display()
                ))
            })?
    } else {
        path.to_path_buf()
    };

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(Error::VcsOperation(format!(
            "{} is outside the repository",
            path.display()
        )));
    }
    Ok(relative)
}
