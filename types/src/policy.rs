//! Validated coordination policies.
//!
//! Invalid configurations (zero retries, zero concurrency) are unrepresentable:
//! the only way to build these types is through constructors that return
//! [`ConfigurationError`].

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Timeout and retry settings for a single retried execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    retries: NonZeroU32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
    pub const DEFAULT_RETRIES: NonZeroU32 = NonZeroU32::new(3).unwrap();
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// Build a policy.
    ///
    /// `retries` is the total number of attempts, not the number of extra attempts
    /// after the first one.
    pub fn new(
        timeout: Duration,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, ConfigurationError> {
        let retries = NonZeroU32::new(retries).ok_or(ConfigurationError::ZeroRetries)?;
        Ok(Self {
            timeout,
            retries,
            retry_delay,
        })
    }

    pub fn with_retries(self, retries: u32) -> Result<Self, ConfigurationError> {
        Self::new(self.timeout, retries, self.retry_delay)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Deadline applied to each attempt individually.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries.get()
    }

    /// Fixed pause between a failed attempt and the next one.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            retries: Self::DEFAULT_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }
}

/// Maximum number of operations a bounded runner keeps in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConcurrencyLimit(NonZeroUsize);

impl ConcurrencyLimit {
    pub fn new(limit: usize) -> Result<Self, ConfigurationError> {
        NonZeroUsize::new(limit)
            .map(Self)
            .ok_or(ConfigurationError::ZeroLimit)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Number of workers needed for `tasks` operations.
    #[must_use]
    pub fn workers_for(self, tasks: usize) -> usize {
        self.get().min(tasks)
    }
}

/// What happens to a debounced call that is superseded by a later one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersededPolicy {
    /// Superseded callers stay attached and settle with the surviving call's outcome.
    #[default]
    ShareFinal,
    /// Superseded callers settle immediately with `DebounceError::Superseded`.
    Reject,
}

impl SupersededPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShareFinal => "share_final",
            Self::Reject => "reject",
        }
    }
}
