//! Shared fakes for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Identity;
use crate::errors::{Error, Result};
use crate::git::VersionControl;

/// A call made against [`RecordingVersionControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    CreateBranch(String),
    ModifyFiles(Vec<String>),
    Commit {
        paths: Vec<PathBuf>,
        coauthor: Option<Identity>,
    },
    WriteFile(PathBuf),
    CommitAs {
        author: String,
        message: String,
    },
    Push(String),
}

/// Records every call and optionally fails one operation.
#[derive(Debug, Default)]
pub struct RecordingVersionControl {
    calls: Mutex<Vec<VcsCall>>,
    fail_on: Option<&'static str>,
}

impl RecordingVersionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named operation (`"create_branch"`, `"push"`, ...) fail.
    pub fn failing_on(operation: &'static str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(operation),
        }
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, call: VcsCall) -> Result<()> {
        if self.fail_on == Some(operation) {
            return Err(Error::VcsOperation(format!("{operation} failed")));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn commit_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, VcsCall::Commit { .. } | VcsCall::CommitAs { .. }))
            .count()
    }
}

impl VersionControl for RecordingVersionControl {
    fn create_branch(&self, name: &str) -> Result<()> {
        self.record("create_branch", VcsCall::CreateBranch(name.to_string()))
    }

    fn modify_files(&self, paths: &[String]) -> Result<Vec<PathBuf>> {
        self.record("modify_files", VcsCall::ModifyFiles(paths.to_vec()))?;
        Ok(paths.iter().map(PathBuf::from).collect())
    }

    fn commit(&self, paths: &[PathBuf], coauthor: Option<&Identity>) -> Result<String> {
        self.record(
            "commit",
            VcsCall::Commit {
                paths: paths.to_vec(),
                coauthor: coauthor.cloned(),
            },
        )?;
        Ok(format!("commit-{}", self.commit_count()))
    }

    fn write_file(&self, path: &Path, _contents: &str) -> Result<PathBuf> {
        self.record("write_file", VcsCall::WriteFile(path.to_path_buf()))?;
        Ok(path.to_path_buf())
    }

    fn commit_as(&self, author: &Identity, _paths: &[PathBuf], message: &str) -> Result<String> {
        self.record(
            "commit_as",
            VcsCall::CommitAs {
                author: author.name.clone(),
                message: message.to_string(),
            },
        )?;
        Ok(format!("commit-{}", self.commit_count()))
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.record("push", VcsCall::Push(branch.to_string()))
    }
}
