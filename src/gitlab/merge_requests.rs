use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use super::errors::GitLabError;
use super::types::{CreatedMergeRequest, MergeRequest};

/// Code-hosting capability: open a merge request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MergeRequestClient: Send + Sync {
    /// Create a merge request; anything but HTTP 201 is an error
    async fn create_merge_request(
        &self,
        request: &MergeRequest,
    ) -> Result<CreatedMergeRequest, GitLabError>;
}

/// GitLab REST v4 client authenticated with a `Private-Token`
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: String,
    timeout: Duration,
}

impl GitLabClient {
    pub fn new(
        base_url: &str,
        project_id: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GitLabError> {
        let endpoint = merge_requests_url(base_url, project_id)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GitLabError::Transport)?;

        Ok(Self {
            http,
            endpoint,
            access_token: access_token.into(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> GitLabError {
        if err.is_timeout() {
            GitLabError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            GitLabError::Transport(err)
        }
    }
}

#[async_trait]
impl MergeRequestClient for GitLabClient {
    async fn create_merge_request(
        &self,
        request: &MergeRequest,
    ) -> Result<CreatedMergeRequest, GitLabError> {
        debug!(
            endpoint = %self.endpoint,
            source_branch = %request.source_branch,
            target_branch = %request.target_branch,
            "Creating merge request"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Private-Token", &self.access_token)
            .form(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if status != StatusCode::CREATED {
            return Err(GitLabError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GitLabError::InvalidResponse(e.to_string()))
    }
}

/// `{base_url}/projects/{project_id}/merge_requests`, with the project id
/// encoded as one path segment so `group/project` ids survive.
fn merge_requests_url(base_url: &str, project_id: &str) -> Result<Url, GitLabError> {
    let invalid = |reason: String| GitLabError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push("projects")
        .push(project_id)
        .push("merge_requests");

    Ok(url)
}
