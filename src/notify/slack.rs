use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{NotificationError, Notifier};

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack answers 200 for most failures and reports them in the body
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client for `chat.postMessage`
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
    timeout: Duration,
}

impl SlackClient {
    pub fn new(
        api_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let invalid = |reason: String| NotificationError::InvalidApiUrl {
            url: api_url.to_string(),
            reason,
        };

        let mut endpoint = Url::parse(api_url).map_err(|e| invalid(e.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("chat.postMessage");

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotificationError::Transport)?;

        Ok(Self {
            http,
            endpoint,
            token: token.into(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> NotificationError {
        if err.is_timeout() {
            NotificationError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            NotificationError::Transport(err)
        }
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), NotificationError> {
        debug!(channel, "Posting Slack message");

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&PostMessage { channel, text })
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(NotificationError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SlackResponse = serde_json::from_str(&body)
            .map_err(|e| NotificationError::InvalidResponse(e.to_string()))?;
        if !parsed.ok {
            return Err(NotificationError::Api(
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        Ok(())
    }
}
