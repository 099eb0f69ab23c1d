//! Error taxonomy for the coordination primitives.
//!
//! The operation's own error type `E` is always carried through unchanged so callers
//! can branch on the underlying cause.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Invalid parameters passed to a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("retries must be at least 1")]
    ZeroRetries,
    #[error("concurrency limit must be at least 1")]
    ZeroLimit,
}

/// Failure of a retried execution once every attempt is exhausted.
///
/// Reflects the final attempt only: a run that timed out twice and then failed with an
/// operation error reports `Operation`.
#[derive(Debug, Clone, Error)]
pub enum RetryError<E> {
    #[error("Timeout: attempt {attempts} exceeded {timeout:?}")]
    Timeout { timeout: Duration, attempts: u32 },
    #[error("operation failed on attempt {attempts}: {source}")]
    Operation {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Number of attempts made before giving up.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. } | Self::Operation { attempts, .. } => *attempts,
        }
    }

    /// The final operation error, or `None` if the final attempt timed out.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::Timeout { .. } => None,
        }
    }
}

/// Failure of a bounded run.
#[derive(Debug, Clone, Error)]
pub enum RunError<E> {
    #[error("invalid runner configuration: {0}")]
    Config(#[from] ConfigurationError),
    #[error("operation {index} failed: {source}")]
    Operation {
        index: usize,
        #[source]
        source: E,
    },
}

/// Failure of a debounced call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebounceError<E> {
    /// A later call replaced this one before its delay elapsed.
    #[error("superseded by a later call")]
    Superseded,
    /// The dispatcher stopped before this call settled (operation panicked or the
    /// runtime shut down).
    #[error("debounced call was abandoned before it settled")]
    Abandoned,
    #[error("debounced operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> DebounceError<E> {
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Superseded | Self::Abandoned => None,
        }
    }
}

/// Every alternative of a race failed.
///
/// Holds one error per operation, in the order the operations were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateError<E> {
    errors: Vec<E>,
}

impl<E> AggregateError<E> {
    #[must_use]
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    #[must_use]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("no operations to race");
        }
        write!(f, "all {} operations failed", self.errors.len())?;
        for (index, err) in self.errors.iter().enumerate() {
            write!(f, "; [{index}] {err}")?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for AggregateError<E> {}
