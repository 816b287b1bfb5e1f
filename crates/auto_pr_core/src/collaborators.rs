//! Multi-contributor commit simulation.
//!
//! Produces a series of commits on the current branch, each authored by one of the
//! configured collaborators, so the resulting pull request has several contributors.

use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, info, instrument};

use crate::config::Identity;
use crate::errors::Result;
use crate::git::VersionControl;

#[cfg(test)]
#[path = "collaborators_tests.rs"]
mod tests;

/// One commit made by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub collaborator: String,
    pub email: String,
    pub files: Vec<PathBuf>,
    pub message: String,
    pub commit_id: String,
}

/// Creates commits authored by a list of collaborators.
pub struct CollaboratorSimulator<'a> {
    vcs: &'a dyn VersionControl,
    collaborators: Vec<Identity>,
}

impl<'a> CollaboratorSimulator<'a> {
    pub fn new(vcs: &'a dyn VersionControl, collaborators: Vec<Identity>) -> Self {
        Self { vcs, collaborators }
    }

    pub fn collaborators(&self) -> &[Identity] {
        &self.collaborators
    }

    /// Creates `commits_per_collaborator` commits for every collaborator.
    ///
    /// Collaborators take turns: round one has one commit from each collaborator in
    /// configuration order, then round two, and so on. Each commit adds
    /// `contributions/<slug>/contribution-<round>.md`. Records are returned oldest first.
    #[instrument(skip(self), fields(collaborators = self.collaborators.len()))]
    pub fn create_multi_collaborator_commits(
        &self,
        branch: &str,
        commits_per_collaborator: u32,
    ) -> Result<Vec<CommitRecord>> {
        let mut records = Vec::new();

        for round in 1..=commits_per_collaborator {
            for collaborator in &self.collaborators {
                let path = PathBuf::from("contributions")
                    .join(slug(&collaborator.name))
                    .join(format!("contribution-{round}.md"));
                let contents = contribution_contents(collaborator, round, branch);
                let written = self.vcs.write_file(&path, &contents)?;

                let message = format!("Add contribution {round} from {}", collaborator.name);
                let files = vec![written];
                let commit_id = self.vcs.commit_as(collaborator, &files, &message)?;

                debug!(
                    collaborator = collaborator.name.as_str(),
                    round = round,
                    commit = commit_id.as_str(),
                    "Created collaborator commit"
                );
                records.push(CommitRecord {
                    collaborator: collaborator.name.clone(),
                    email: collaborator.email.clone(),
                    files,
                    message,
                    commit_id,
                });
            }
        }

        info!(
            branch = branch,
            commits = records.len(),
            "Created collaborator commits"
        );
        Ok(records)
    }
}

/// Collaborator names in order of first appearance, without duplicates.
pub fn distinct_collaborators(records: &[CommitRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        if !names.contains(&record.collaborator) {
            names.push(record.collaborator.clone());
        }
    }
    names
}

fn contribution_contents(collaborator: &Identity, round: u32, branch: &str) -> String {
    format!(
        "# Contribution {round} by {}\n\n- Branch: {branch}\n- Time: {}\n",
        collaborator.name,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Lowercase ASCII alphanumerics with single dashes between words.
fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "contributor".to_string()
    } else {
        slug
    }
}
