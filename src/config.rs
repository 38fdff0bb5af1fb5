//! Application-level configuration loading: vote engine tuning and room policies.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "JUKEBOX_BACK_CONFIG_PATH";

/// What happens to a room's votes when its creator's last session disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorDeparturePolicy {
    /// Leave votes and queue order untouched.
    #[default]
    KeepVotes,
    /// Drop every vote in the room and re-rank the queue by entry order.
    ResetVotes,
}

/// Bounded exponential backoff used when a durable write hits a version conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: u32,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            multiplier: 2,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Period of the cache/store reconciliation pass.
    pub reconcile_interval_ms: u64,
    /// Lifetime of vote cache entries.
    pub vote_cache_ttl_secs: u64,
    pub vote_retry: RetryConfig,
    /// How long a caller waits for its turn on a song before giving up.
    pub vote_timeout_ms: u64,
    pub creator_departure: CreatorDeparturePolicy,
    /// Buffered events per room subscriber before it starts lagging.
    pub event_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: 5_000,
            vote_cache_ttl_secs: 3_600,
            vote_retry: RetryConfig::default(),
            vote_timeout_ms: 5_000,
            creator_departure: CreatorDeparturePolicy::default(),
            event_channel_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        policy = ?config.creator_departure,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; missing fields keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms.max(1))
    }

    pub fn vote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.vote_cache_ttl_secs)
    }

    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "creator_departure": "reset_votes", "vote_retry": { "max_attempts": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.creator_departure, CreatorDeparturePolicy::ResetVotes);
        assert_eq!(config.vote_retry.max_attempts, 3);
        assert_eq!(config.vote_retry.initial_backoff_ms, 100);
        assert_eq!(config.reconcile_interval(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(AppConfig::from_json(r#"{ "creator_departure": "shuffle" }"#).is_err());
    }
}
