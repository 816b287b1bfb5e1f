//! The end-to-end auto PR workflow.
//!
//! A run prepares a branch (single mode: modify and commit the configured files;
//! collaborator mode: simulate commits from several contributors), pushes it, opens a
//! pull request, labels it, merges it and reports the result to the chat channels.
//! Any failure ends the run, is reported once through an error notification and is
//! returned as [`RunOutcome::Failed`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Local;
use github_client::{GitHubClient, MergeMethod, PullRequest, PullRequestClient};
use tracing::{debug, error, info, instrument, warn};

use crate::branch::{generate_branch_name, COLLABORATOR_MODE_PREFIX, SINGLE_MODE_PREFIX};
use crate::collaborators::{distinct_collaborators, CollaboratorSimulator, CommitRecord};
use crate::config::AppConfig;
use crate::errors::{Error, Result};
use crate::git::{GitRepository, VersionControl};
use crate::notifications::{NotificationDispatcher, NotificationStatus};
use crate::secrets::{SecretResolver, Secrets};
use crate::template::{
    collaborative_pr_body, collaborative_pr_title, load_pr_template, render_pr_template,
    DEFAULT_PR_TITLE,
};

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

/// Label added to collaborator mode pull requests.
pub const COLLABORATIVE_LABEL: &str = "collaborative";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One commit with the configured file updates.
    #[default]
    Single,
    /// Several commits from simulated collaborators.
    Collaborator,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Single => "single",
            RunMode::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" => Ok(RunMode::Single),
            "collaborator" => Ok(RunMode::Collaborator),
            other => Err(format!(
                "unknown mode '{other}', expected single or collaborator"
            )),
        }
    }
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    pub dry_run: bool,
    /// Overrides `collaboration.commits_per_collaborator`.
    pub commits_per_collaborator: Option<u32>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pull request was created, labelled and merged.
    Completed { pull_request: PullRequest },
    /// Dry run: nothing was changed.
    DryRun { branch: String },
    /// Single mode with no files configured. Nothing was changed.
    NothingToDo,
    /// A step failed. Later steps were skipped.
    Failed(Error),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. } | RunOutcome::DryRun { .. })
    }

    /// Process exit status: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// A pushed branch waiting for its pull request.
struct PreparedBranch {
    name: String,
    commits: Option<Vec<CommitRecord>>,
}

/// Drives the workflow against a repository host, a local repository and the chat
/// channels.
pub struct AutoPrCreator {
    config: AppConfig,
    github: Arc<dyn PullRequestClient>,
    vcs: Arc<dyn VersionControl>,
    notifier: NotificationDispatcher,
}

impl AutoPrCreator {
    pub fn new(
        config: AppConfig,
        github: Arc<dyn PullRequestClient>,
        vcs: Arc<dyn VersionControl>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            config,
            github,
            vcs,
            notifier,
        }
    }

    /// Loads the configuration and secrets and builds the production collaborators.
    ///
    /// Nothing is changed locally or remotely.
    ///
    /// # Errors
    ///
    /// Configuration errors, `Error::MissingCredential` when the token is not set, and
    /// `Error::Api` wrapping a client configuration error.
    pub fn initialize(config_path: &Path, resolver: &dyn SecretResolver) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let secrets = Secrets::load(resolver)?;

        let repository = config.repository();
        let github = GitHubClient::new(
            config.api_url(),
            &repository.owner,
            &repository.name,
            secrets.github_token.clone(),
            config.retry_policy(),
        )?
        .with_default_branch(repository.default_branch());

        let vcs = GitRepository::new(
            config.repository_path(),
            config.remote(),
            secrets.github_token.clone(),
        )
        .with_author(config.commit_author().cloned());

        let notifier = NotificationDispatcher::new(
            repository.full_name(),
            secrets.discord_webhook.clone(),
            secrets.slack_webhook.clone(),
            config.notification_settings().clone(),
        );

        info!("Auto PR Creator initialized successfully");
        Ok(Self::new(config, Arc::new(github), Arc::new(vcs), notifier))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Executes the workflow. Never panics and never returns an error; failures are
    /// reported through the outcome.
    #[instrument(skip(self), fields(mode = %options.mode, dry_run = options.dry_run))]
    pub async fn run(&self, options: &RunOptions) -> RunOutcome {
        if options.dry_run {
            info!("DRY RUN MODE - No changes will be made");
        }

        match self.execute(options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(kind = e.kind(), "Automation failed: {}", e);
                let mut context = BTreeMap::new();
                context.insert("mode".to_string(), options.mode.to_string());
                self.notifier
                    .notify_error(&e.to_string(), e.kind(), &context)
                    .await;
                RunOutcome::Failed(e)
            }
        }
    }

    async fn execute(&self, options: &RunOptions) -> Result<RunOutcome> {
        let prepared = match options.mode {
            RunMode::Single => self.run_single_mode(options.dry_run)?,
            RunMode::Collaborator => {
                let per_collaborator = options
                    .commits_per_collaborator
                    .unwrap_or_else(|| self.config.commits_per_collaborator());
                self.run_collaborator_mode(options.dry_run, per_collaborator)?
            }
        };

        match prepared {
            None => Ok(RunOutcome::NothingToDo),
            Some(branch) if options.dry_run => {
                info!(branch = branch.name.as_str(), "[DRY RUN] Would create and merge PR");
                Ok(RunOutcome::DryRun { branch: branch.name })
            }
            Some(branch) => {
                let pull_request = self
                    .create_and_merge_pr(&branch.name, branch.commits.as_deref())
                    .await?;
                Ok(RunOutcome::Completed { pull_request })
            }
        }
    }

    /// Branch, modify, commit and push. Returns `None` when no files are configured.
    fn run_single_mode(&self, dry_run: bool) -> Result<Option<PreparedBranch>> {
        let branch = generate_branch_name(SINGLE_MODE_PREFIX, self.config.branch_max_length());
        info!(branch = branch.as_str(), "Generated branch name");

        let files = self.config.files_to_modify();
        if dry_run {
            info!("[DRY RUN] Would create branch: {}", branch);
            info!(files = ?files, "[DRY RUN] Would modify files");
            info!("[DRY RUN] Would commit and push changes");
            return Ok(Some(PreparedBranch {
                name: branch,
                commits: None,
            }));
        }

        if files.is_empty() {
            warn!("No files configured to modify");
            return Ok(None);
        }

        self.vcs.create_branch(&branch)?;

        let modified = self.vcs.modify_files(files)?;
        info!(count = modified.len(), "Modified files");

        let coauthor = self.config.coauthor();
        self.vcs.commit(&modified, coauthor.as_ref())?;

        self.vcs.push(&branch)?;
        info!(branch = branch.as_str(), "Pushed changes to remote");

        Ok(Some(PreparedBranch {
            name: branch,
            commits: None,
        }))
    }

    fn run_collaborator_mode(
        &self,
        dry_run: bool,
        commits_per_collaborator: u32,
    ) -> Result<Option<PreparedBranch>> {
        let branch =
            generate_branch_name(COLLABORATOR_MODE_PREFIX, self.config.branch_max_length());
        info!(branch = branch.as_str(), "Creating collaborative branch");

        let simulator =
            CollaboratorSimulator::new(self.vcs.as_ref(), self.config.collaborators().to_vec());

        if dry_run {
            info!("[DRY RUN] Would create branch: {}", branch);
            info!(
                "[DRY RUN] Would create {} commits from each of {} collaborators",
                commits_per_collaborator,
                simulator.collaborators().len()
            );
            return Ok(Some(PreparedBranch {
                name: branch,
                commits: None,
            }));
        }

        self.vcs.create_branch(&branch)?;
        let commits = simulator.create_multi_collaborator_commits(&branch, commits_per_collaborator)?;

        self.vcs.push(&branch)?;
        info!(
            branch = branch.as_str(),
            commits = commits.len(),
            "Pushed collaborator commits to remote"
        );

        Ok(Some(PreparedBranch {
            name: branch,
            commits: Some(commits),
        }))
    }

    /// Opens, labels and squash-merges the pull request, then sends the `merged`
    /// notification.
    async fn create_and_merge_pr(
        &self,
        branch: &str,
        commits: Option<&[CommitRecord]>,
    ) -> Result<PullRequest> {
        let (title, body) = match commits {
            Some(commits) => {
                let contributors = distinct_collaborators(commits);
                (
                    collaborative_pr_title(contributors.len()),
                    collaborative_pr_body(&contributors, commits.len(), branch),
                )
            }
            None => {
                let title = self
                    .config
                    .pr_title()
                    .unwrap_or(DEFAULT_PR_TITLE)
                    .to_string();
                let template = load_pr_template(&self.config.pr_template_path());
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                (title, render_pr_template(&template, &timestamp, branch))
            }
        };

        let mut pr = self
            .github
            .create_pull_request(branch, &title, &body, self.config.pr_draft())
            .await?;

        let mut labels = self.config.pr_labels();
        if commits.is_some() {
            labels.push(COLLABORATIVE_LABEL.to_string());
        }
        if labels.is_empty() {
            debug!(number = pr.number, "No labels configured");
        } else {
            self.github.add_labels(pr.number, &labels).await?;
        }

        if let Some(configured) = self.config.merge_method() {
            if configured != MergeMethod::Squash {
                warn!(
                    configured = %configured,
                    "Ignoring configured merge method, automated PRs are squash merged"
                );
            }
        }
        let method = MergeMethod::Squash;
        let result = self.github.merge_pull_request(pr.number, method).await?;
        if !result.merged {
            return Err(Error::Api(github_client::Error::ApiRequest {
                status: None,
                message: format!("PR #{} was not merged: {}", pr.number, result.message),
            }));
        }
        pr.merged = true;
        info!(
            number = pr.number,
            merge_method = %method,
            "Successfully created and merged PR"
        );

        self.notifier.notify(&pr, NotificationStatus::Merged).await;
        Ok(pr)
    }
}
