use std::path::PathBuf;
use thiserror::Error;

use super::plan::PlanError;
use crate::git::GitError;
use crate::gitlab::GitLabError;
use crate::notify::NotificationError;

/// Errors that stop a run before any department is processed
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Cannot open repository: {0}")]
    Repository(#[source] GitError),
    #[error("Working tree has uncommitted changes to tracked files: {}", paths.join(", "))]
    DirtyWorkingTree { paths: Vec<String> },
    #[error("Failed to check out target branch '{branch}': {source}")]
    TargetCheckout {
        branch: String,
        #[source]
        source: GitError,
    },
    #[error("Failed to read target branch '{branch}': {source}")]
    TargetLookup {
        branch: String,
        #[source]
        source: GitError,
    },
    #[error("Invalid deletion plan: {0}")]
    Plan(#[from] PlanError),
    #[error("Cannot build GitLab client: {0}")]
    GitLab(#[from] GitLabError),
    #[error("Cannot build chat client: {0}")]
    Notifier(#[from] NotificationError),
    #[error("Working tree is locked by another offboarding run ({0})")]
    Locked(PathBuf),
    #[error("Failed to lock working tree at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
