//! First success among redundant alternatives.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use tempo_types::{AggregateError, RaceWin};

use crate::task::spawn_detached;

/// Start every operation at once and return the first one to succeed.
///
/// Failures do not end the race early: as long as one operation is still running it may
/// yet succeed. Operations still running when a winner is found are left to finish on
/// their own; their results are discarded.
///
/// # Errors
///
/// Returns an [`AggregateError`] with one error per operation, in input order, once
/// every operation has failed. An empty input fails immediately with no errors.
pub async fn race_first_success<F, Fut, T, E>(
    operations: Vec<F>,
) -> Result<RaceWin<T>, AggregateError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let total = operations.len();
    let mut contenders: FuturesUnordered<_> = operations
        .into_iter()
        .enumerate()
        .map(|(source, operation)| {
            let task = spawn_detached(operation());
            async move { (source, task.await) }
        })
        .collect();

    let mut errors: Vec<Option<E>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((source, result)) = contenders.next().await {
        match result {
            Ok(data) => {
                tracing::debug!(source, contenders = total, "Race won");
                return Ok(RaceWin { data, source });
            }
            Err(err) => {
                tracing::debug!(source, "Race contender failed");
                errors[source] = Some(err);
            }
        }
    }

    tracing::warn!(contenders = total, "Every race contender failed");
    Err(AggregateError::new(errors.into_iter().flatten().collect()))
}
