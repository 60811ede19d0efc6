//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Change detection settings
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Change report delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration if the file exists. `Ok(None)` when it is absent;
    /// a file that exists but does not parse is an error.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(toml::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.connect_timeout_secs == 0 {
            return Err(AppError::validation(
                "fetch.connect_timeout_secs must be > 0",
            ));
        }
        if self.checker.max_concurrent == 0 {
            return Err(AppError::validation("checker.max_concurrent must be > 0"));
        }
        if let Some(webhook) = self.notify.webhook() {
            let parsed = url::Url::parse(webhook)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "notify.webhook_url must be http(s), got '{}'",
                    parsed.scheme()
                )));
            }
            if self.notify.to.trim().is_empty() {
                return Err(AppError::validation(
                    "notify.to is required when notify.webhook_url is set",
                ));
            }
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// TCP/TLS connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total request timeout (connect + read) in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            connect_timeout_secs: defaults::connect_timeout(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Which comparison strategy a checker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Raw fingerprint of a single sample
    Naive,
    /// Learned exclusion pattern with confirmation sampling
    #[default]
    Invariance,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Naive => f.write_str("naive"),
            StrategyKind::Invariance => f.write_str("invariance"),
        }
    }
}

/// Change detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Delay between the two samples of a bootstrap or confirmation, in milliseconds
    #[serde(default = "defaults::sample_delay")]
    pub sample_delay_ms: u64,

    /// Maximum sites checked at the same time
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for a whole batch in seconds (0 disables it)
    #[serde(default)]
    pub run_timeout_secs: u64,
}

impl CheckerConfig {
    pub fn sample_delay(&self) -> Duration {
        Duration::from_millis(self.sample_delay_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            sample_delay_ms: defaults::sample_delay(),
            max_concurrent: defaults::max_concurrent(),
            run_timeout_secs: 0,
        }
    }
}

/// Settings handed to the notifier at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving the JSON report; empty means log only
    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "defaults::subject")]
    pub subject: String,

    #[serde(default = "defaults::from")]
    pub from: String,

    /// Recipient address
    #[serde(default)]
    pub to: String,
}

impl NotifyConfig {
    /// The webhook URL, if one is configured.
    pub fn webhook(&self) -> Option<&str> {
        let trimmed = self.webhook_url.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            subject: defaults::subject(),
            from: defaults::from(),
            to: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; brang/1.0)".into()
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn sample_delay() -> u64 {
        2000
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn subject() -> String {
        "Brang.io: Site changes detected".into()
    }
    pub fn from() -> String {
        "notify@brang.io".into()
    }
    pub fn level() -> String {
        "info".into()
    }
}
