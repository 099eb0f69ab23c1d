//! Configuration for Tempo's default coordination policies.
//!
//! Loaded from `~/.tempo/config.toml`, or from the file named by `TEMPO_CONFIG`.
//! Every section and field is optional; missing values fall back to library defaults.
//!
//! ```toml
//! [retry]
//! timeout_ms = 5000
//! retries = 3
//! retry_delay_ms = 100
//!
//! [runner]
//! limit = 4
//!
//! [cache]
//! ttl_ms = 1000
//!
//! [debounce]
//! delay_ms = 300
//! policy = "share_final" # or "reject"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use tempo_types::{ConcurrencyLimit, ConfigurationError, RetryPolicy, SupersededPolicy};

pub const CONFIG_ENV_VAR: &str = "TEMPO_CONFIG";

const DEFAULT_RUNNER_LIMIT: usize = 4;
const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(1_000);
const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Default, Deserialize)]
pub struct TempoConfig {
    pub retry: Option<RetrySection>,
    pub runner: Option<RunnerSection>,
    pub cache: Option<CacheSection>,
    pub debounce: Option<DebounceSection>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `[retry]`: defaults for `execute_with_retry`.
#[derive(Debug, Default, Deserialize)]
pub struct RetrySection {
    pub timeout_ms: Option<u64>,
    /// Total attempts, including the first one.
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl RetrySection {
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigurationError> {
        let mut policy = RetryPolicy::default();
        if let Some(retries) = self.retries {
            policy = policy.with_retries(retries)?;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            policy = policy.with_timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(retry_delay_ms) = self.retry_delay_ms {
            policy = policy.with_retry_delay(Duration::from_millis(retry_delay_ms));
        }
        Ok(policy)
    }
}

/// `[runner]`: defaults for `run_bounded`.
#[derive(Debug, Default, Deserialize)]
pub struct RunnerSection {
    pub limit: Option<usize>,
}

impl RunnerSection {
    pub fn limit(&self) -> Result<ConcurrencyLimit, ConfigurationError> {
        ConcurrencyLimit::new(self.limit.unwrap_or(DEFAULT_RUNNER_LIMIT))
    }
}

/// `[cache]`: defaults for `memoize_with_ttl`.
#[derive(Debug, Default, Deserialize)]
pub struct CacheSection {
    pub ttl_ms: Option<u64>,
}

impl CacheSection {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl_ms.map_or(DEFAULT_CACHE_TTL, Duration::from_millis)
    }
}

/// `[debounce]`: defaults for `debounce`.
#[derive(Debug, Default, Deserialize)]
pub struct DebounceSection {
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub policy: SupersededPolicy,
}

impl DebounceSection {
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay_ms
            .map_or(DEFAULT_DEBOUNCE_DELAY, Duration::from_millis)
    }
}

impl TempoConfig {
    /// Load the user's config file.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigurationError> {
        self.retry
            .as_ref()
            .map_or_else(|| Ok(RetryPolicy::default()), RetrySection::to_policy)
    }

    pub fn runner_limit(&self) -> Result<ConcurrencyLimit, ConfigurationError> {
        self.runner
            .as_ref()
            .map_or_else(|| RunnerSection::default().limit(), RunnerSection::limit)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache.as_ref().map_or(DEFAULT_CACHE_TTL, CacheSection::ttl)
    }

    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        self.debounce
            .as_ref()
            .map_or(DEFAULT_DEBOUNCE_DELAY, DebounceSection::delay)
    }

    #[must_use]
    pub fn superseded_policy(&self) -> SupersededPolicy {
        self.debounce
            .as_ref()
            .map(|section| section.policy)
            .unwrap_or_default()
    }
}

/// `$TEMPO_CONFIG` if set, otherwise `~/.tempo/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".tempo").join("config.toml"))
}
