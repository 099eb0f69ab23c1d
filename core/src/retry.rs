//! Timeout-bounded execution with fixed-delay retries.
//!
//! # Retry Policy
//!
//! - `retries` is the total attempt budget (3 = first attempt plus two retries)
//! - each attempt races the operation against `timeout`
//! - a failed attempt that is not the last waits `retry_delay` before the next one;
//!   the delay does not count against the next attempt's timeout
//!
//! # Timeouts are soft
//!
//! Every attempt runs as a detached task. When the deadline passes first the attempt
//! counts as timed out, but the operation keeps running and its eventual result is
//! discarded. Operations that must stop on timeout have to honor their own
//! cancellation signal.

use std::fmt;
use std::future::Future;

use tempo_types::{Outcome, RetryError, RetryPolicy};

use crate::clock::{Instant, after, within};
use crate::task::spawn_detached;

/// Run `operation` until it succeeds or the policy's attempt budget is exhausted.
///
/// `operation` is invoked once per attempt to produce a fresh future. On success the
/// returned [`Outcome`] carries the value, the elapsed time since the first attempt
/// started and the number of attempts made.
///
/// # Errors
///
/// After the final attempt fails, returns [`RetryError::Timeout`] if that attempt ran
/// out of time, or [`RetryError::Operation`] with the operation's own error.
pub async fn execute_with_retry<F, Fut, T, E>(
    mut operation: F,
    policy: &RetryPolicy,
) -> Result<Outcome<T>, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let start = Instant::now();
    let retries = policy.retries();
    let mut attempt = 1;

    loop {
        let failure = match within(policy.timeout(), spawn_detached(operation())).await {
            Some(Ok(data)) => {
                let duration = start.elapsed();
                tracing::debug!(
                    attempt,
                    elapsed_ms = duration.as_millis(),
                    "Operation succeeded"
                );
                return Ok(Outcome {
                    data,
                    duration,
                    attempts: attempt,
                });
            }
            Some(Err(source)) => RetryError::Operation {
                attempts: attempt,
                source,
            },
            None => RetryError::Timeout {
                timeout: policy.timeout(),
                attempts: attempt,
            },
        };

        if attempt >= retries {
            tracing::warn!(
                attempts = attempt,
                elapsed_ms = start.elapsed().as_millis(),
                error = %failure,
                "Retries exhausted"
            );
            return Err(failure);
        }

        tracing::debug!(
            attempt,
            elapsed_ms = start.elapsed().as_millis(),
            delay_ms = policy.retry_delay().as_millis(),
            timed_out = failure.is_timeout(),
            error = %failure,
            "Retrying operation after failed attempt"
        );
        after(policy.retry_delay()).await;
        attempt += 1;
    }
}
