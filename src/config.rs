//! Configuration loader and validator for the notification service.
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub retry: Retry,
    pub email: Email,
    pub push: Push,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub broadcast_concurrency: usize,
}

/// Retry limits shared by the email and push channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Retry {
    pub max_attempts: u32,
    pub backoff_ms: Vec<u64>,
}

/// Mail relay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    pub endpoint: String,
    pub token: String,
    pub from: String,
}

/// Push gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Push {
    pub endpoint: String,
    pub token: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            self.retry
                .backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.broadcast_concurrency == 0 {
        return Err(ConfigError::Invalid("app.broadcast_concurrency must be > 0"));
    }

    if cfg.retry.max_attempts == 0 {
        return Err(ConfigError::Invalid("retry.max_attempts must be > 0"));
    }
    if cfg.retry.backoff_ms.is_empty() {
        return Err(ConfigError::Invalid("retry.backoff_ms must be non-empty"));
    }

    if cfg.email.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("email.endpoint must be non-empty"));
    }
    if cfg.email.token.trim().is_empty() {
        return Err(ConfigError::Invalid("email.token must be non-empty"));
    }
    if cfg.email.from.trim().is_empty() {
        return Err(ConfigError::Invalid("email.from must be non-empty"));
    }

    if cfg.push.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("push.endpoint must be non-empty"));
    }
    if cfg.push.token.trim().is_empty() {
        return Err(ConfigError::Invalid("push.token must be non-empty"));
    }

    Ok(())
}

/// Example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  broadcast_concurrency: 8

retry:
  max_attempts: 3
  backoff_ms: [1000, 2000, 4000]

email:
  endpoint: "https://mail.example.com/"
  token: "YOUR_MAIL_RELAY_TOKEN"
  from: "noreply@flats.example"

push:
  endpoint: "https://push.example.com/"
  token: "YOUR_PUSH_GATEWAY_TOKEN"
"#
}
