//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::handover::HandoverTimings;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001/v1";
pub const DEFAULT_ANNOUNCE_DELAY_MS: u64 = 1000;
pub const DEFAULT_GREETING_DELAY_MS: u64 = 1500;

/// Errors produced while building [`ChatConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub user_id: Option<String>,
    pub request_timeout: Option<Duration>,
    pub handover: HandoverTimings,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            user_id: None,
            request_timeout: None,
            handover: HandoverTimings::default(),
        }
    }
}

impl ChatConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `VALEMAIN_API_BASE_URL`: default `http://localhost:8001/v1`
    /// - `VALEMAIN_USER_ID`: forwarded as `user_id`; empty means unset
    /// - `VALEMAIN_REQUEST_TIMEOUT_SECS`: no timeout when absent
    /// - `VALEMAIN_HANDOVER_ANNOUNCE_MS`: default 1000
    /// - `VALEMAIN_HANDOVER_GREETING_MS`: default 1500
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is present but not a valid integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ChatConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("VALEMAIN_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim()
            .trim_end_matches('/')
            .to_owned();

        let user_id = non_empty(lookup("VALEMAIN_USER_ID"));

        let request_timeout = parse_u64("VALEMAIN_REQUEST_TIMEOUT_SECS", lookup("VALEMAIN_REQUEST_TIMEOUT_SECS"))?
            .map(Duration::from_secs);

        let announce_ms = parse_u64("VALEMAIN_HANDOVER_ANNOUNCE_MS", lookup("VALEMAIN_HANDOVER_ANNOUNCE_MS"))?
            .unwrap_or(DEFAULT_ANNOUNCE_DELAY_MS);
        let greeting_ms = parse_u64("VALEMAIN_HANDOVER_GREETING_MS", lookup("VALEMAIN_HANDOVER_GREETING_MS"))?
            .unwrap_or(DEFAULT_GREETING_DELAY_MS);

        Ok(Self {
            base_url,
            user_id,
            request_timeout,
            handover: HandoverTimings {
                announce_delay: Duration::from_millis(announce_ms),
                greeting_delay: Duration::from_millis(greeting_ms),
            },
        })
    }

    /// Apply command-line overrides on top of environment values.
    #[must_use]
    pub fn with_overrides(mut self, base_url: Option<String>, user_id: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.trim().trim_end_matches('/').to_owned();
        }
        if let Some(user_id) = non_empty(user_id) {
            self.user_id = Some(user_id);
        }
        self
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn parse_u64(key: &str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::ConfigParse(format!("{key} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
