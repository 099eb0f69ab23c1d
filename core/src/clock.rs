//! Time source shared by every primitive.
//!
//! Backed by `tokio::time`, so tests can drive it with a paused clock.

use std::future::Future;
use std::time::Duration;

pub use tokio::time::Instant;

/// Completes once `duration` has elapsed.
pub async fn after(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Await `future` for at most `limit`.
///
/// Returns `None` if the deadline passed first. The future is dropped in that case;
/// wrap it with a detached task first if the work must keep running.
pub async fn within<F: Future>(limit: Duration, future: F) -> Option<F::Output> {
    tokio::time::timeout(limit, future).await.ok()
}
