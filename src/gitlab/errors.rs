use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("Invalid GitLab base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("GitLab API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("GitLab request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("GitLab request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Unexpected GitLab response: {0}")]
    InvalidResponse(String),
}

impl GitLabError {
    /// HTTP status when the API answered with something other than 201
    pub fn status(&self) -> Option<u16> {
        match self {
            GitLabError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
