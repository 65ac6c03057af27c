use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Succeeded,
    Failed,
    /// None of the department's files existed; nothing was pushed
    Skipped,
}

/// Git step a department failed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsStage {
    CreateBranch,
    CheckoutBranch,
    RemoveFile,
    Commit,
    Push,
}

impl fmt::Display for VcsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            VcsStage::CreateBranch => "create branch",
            VcsStage::CheckoutBranch => "checkout branch",
            VcsStage::RemoveFile => "remove file",
            VcsStage::Commit => "commit",
            VcsStage::Push => "push",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DepartmentFailure {
    Vcs { stage: VcsStage, message: String },
    RemoteApi { status: Option<u16>, message: String },
}

impl fmt::Display for DepartmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartmentFailure::Vcs { stage, message } => write!(f, "git {stage} failed: {message}"),
            DepartmentFailure::RemoteApi { message, .. } => {
                write!(f, "merge request creation failed: {message}")
            }
        }
    }
}

/// Outcome of processing one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchResult {
    pub department: String,
    pub source_branch: String,
    pub files_deleted: Vec<String>,
    pub files_missing: Vec<String>,
    pub commit_id: Option<String>,
    pub merge_request_url: Option<String>,
    pub notified: bool,
    pub status: BranchStatus,
    pub failure: Option<DepartmentFailure>,
    pub notification_error: Option<String>,
}

impl BranchResult {
    pub fn new(department: &str, source_branch: &str) -> Self {
        Self {
            department: department.to_string(),
            source_branch: source_branch.to_string(),
            files_deleted: Vec::new(),
            files_missing: Vec::new(),
            commit_id: None,
            merge_request_url: None,
            notified: false,
            status: BranchStatus::Failed,
            failure: None,
            notification_error: None,
        }
    }

    pub(crate) fn fail(&mut self, failure: DepartmentFailure) {
        self.status = BranchStatus::Failed;
        self.failure = Some(failure);
    }
}

/// Everything one sweep produced, in processing order
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub host: Option<String>,
    pub target_branch: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BranchResult>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(BranchStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(BranchStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(BranchStatus::Skipped)
    }

    pub fn result_for(&self, department: &str) -> Option<&BranchResult> {
        self.results.iter().find(|r| r.department == department)
    }

    fn count(&self, status: BranchStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// What a dry run found for one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDepartment {
    pub department: String,
    pub source_branch: String,
    pub existing_files: Vec<String>,
    pub missing_files: Vec<String>,
}
