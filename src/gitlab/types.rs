use serde::{Deserialize, Serialize};

use crate::offboarding::naming::{commit_message, merge_request_description};

/// Form fields of `POST /projects/:id/merge_requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

impl MergeRequest {
    pub fn for_department(department: &str, source_branch: &str, target_branch: &str) -> Self {
        Self {
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            title: commit_message(department),
            description: merge_request_description(department),
        }
    }
}

/// The part of GitLab's merge request representation we rely on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedMergeRequest {
    pub web_url: String,
    #[serde(default)]
    pub iid: Option<u64>,
}
