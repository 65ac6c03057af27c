//! Chat notifications for created merge requests

pub mod slack;

use async_trait::async_trait;
use thiserror::Error;

pub use slack::SlackClient;

/// Channel that receives offboarding notifications
pub const DEFAULT_CHANNEL: &str = "chimera-users";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid chat API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("Chat API rejected the message: {0}")]
    Api(String),
    #[error("Chat API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Chat request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("Chat request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Unexpected chat API response: {0}")]
    InvalidResponse(String),
}

/// Chat capability: post a plain-text message to a channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), NotificationError>;
}

/// Mention of the team owning a department
pub fn owners_mention(department: &str) -> String {
    format!("@{department}-owners")
}

pub fn merge_request_message(department: &str, merge_request_url: &str) -> String {
    format!(
        "{} Merge request created successfully for *{department}* department: {merge_request_url}",
        owners_mention(department)
    )
}
