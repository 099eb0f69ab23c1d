//! Asynchronous coordination primitives for Tempo.
//!
//! Five independent wrappers around caller-supplied operations (closures producing a
//! future of `Result<T, E>`):
//!
//! - **`retry`**: timeout-bounded execution with a fixed-delay retry loop
//! - **`runner`**: bounded-concurrency execution with positional results
//! - **`memo`**: deduplicating cache with per-entry time-to-live
//! - **`debounce`**: trailing-call dispatcher that collapses bursts into one call
//! - **`race`**: first success among redundant alternatives
//!
//! All of them share the time source in [`clock`] and run operations as detached
//! tokio tasks: a caller that stops waiting (timeout, race lost, run failed) never
//! cancels the underlying work.
//!
//! ```text
//! race_first_success([ || cached.call(id), || execute_with_retry(fetch, &policy) ])
//!                            |                         |
//!                      Memoized::call            retry loop + after()
//! ```

pub mod clock;
pub mod debounce;
pub mod memo;
pub mod race;
pub mod retry;
pub mod runner;
mod task;

pub use debounce::{Debounced, debounce, debounce_with_policy};
pub use memo::{Memoized, memoize_with_ttl};
pub use race::race_first_success;
pub use retry::execute_with_retry;
pub use runner::run_bounded;

pub use tempo_types::{
    AggregateError, ConcurrencyLimit, ConfigurationError, DebounceError, Outcome, RaceWin,
    RetryError, RetryPolicy, RunError, SupersededPolicy,
};
