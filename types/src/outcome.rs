//! Success envelopes.
//!
//! These are only ever constructed on success; failure paths surface one of the
//! error types from [`crate::error`] instead of a partially filled envelope.

use std::time::Duration;

/// Result of a successful retried execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    /// Value produced by the successful attempt.
    pub data: T,
    /// Wall-clock time from the start of the first attempt to the final success.
    pub duration: Duration,
    /// Number of attempts made, 1-based (1 = succeeded on first try).
    pub attempts: u32,
}

impl<T> Outcome<T> {
    /// Total elapsed time in whole milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            data: f(self.data),
            duration: self.duration,
            attempts: self.attempts,
        }
    }
}

/// Winner of a first-success race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceWin<T> {
    pub data: T,
    /// 0-based index of the operation that produced `data`.
    pub source: usize,
}
