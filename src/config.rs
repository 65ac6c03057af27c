use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::notify::{slack, DEFAULT_CHANNEL};

/// Settings that are not per-run arguments
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OffboardingConfig {
    pub slack: SlackConfig,
    pub git: GitConfig,
    pub http: HttpConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Channel receiving merge request notifications
    pub channel: String,
    /// Base URL of the Slack Web API
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote the source branches are pushed to
    pub remote: String,
    /// Commit author when the repository has no user configured
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout applied to every GitLab and Slack request
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            api_url: slack::DEFAULT_API_URL.to_string(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            author_name: "Offboarding Bot".to_string(),
            author_email: "noreply@offboarding.local".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl OffboardingConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `offboarding.toml` in the working directory, or `explicit_file`
    /// 3. Environment variables (prefixed with OFFBOARDING__, `__` between levels)
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match explicit_file {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if Path::new("offboarding.toml").exists() {
                    builder = builder.add_source(File::with_name("offboarding"));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("OFFBOARDING")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
        }
        Ok(())
    }
}
