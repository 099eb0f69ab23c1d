//! Bounded-concurrency execution with positional results.
//!
//! `min(limit, len)` workers share a [`WorkQueue`]. Each worker claims the next index
//! from an atomic cursor, runs that operation to completion, and repeats until the
//! queue is drained. Concurrency is bounded by the worker count; results are placed by
//! index regardless of completion order.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use tempo_types::{ConcurrencyLimit, RunError};

use crate::task::spawn_detached;

/// Run `operations` with at most `limit` of them in flight at any time.
///
/// The returned values are in input order. An empty input returns immediately.
///
/// # Errors
///
/// - [`RunError::Config`] if `limit` is zero.
/// - [`RunError::Operation`] with the first failure observed. Operations already in
///   flight are not cancelled but their results are ignored, and no further
///   operations are started.
pub async fn run_bounded<F, Fut, T, E>(
    operations: Vec<F>,
    limit: usize,
) -> Result<Vec<T>, RunError<E>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let limit = ConcurrencyLimit::new(limit)?;
    let total = operations.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let queue = Arc::new(WorkQueue::new(operations));
    let workers = limit.workers_for(total);
    tracing::debug!(tasks = total, workers, "Starting bounded run");

    let mut running: FuturesUnordered<_> = (0..workers)
        .map(|_| spawn_detached(drain(Arc::clone(&queue))))
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(finished) = running.next().await {
        match finished {
            Ok(completed) => {
                for (index, value) in completed {
                    slots[index] = Some(value);
                }
            }
            Err(err) => {
                if let RunError::Operation { index, .. } = &err {
                    tracing::warn!(index, tasks = total, "Bounded run failed");
                }
                return Err(err);
            }
        }
    }

    // Every index is claimed exactly once and every worker finished cleanly.
    let results: Vec<T> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total);
    Ok(results)
}

/// One worker: claim, run, record, until the queue is empty or halted.
async fn drain<F, Fut, T, E>(queue: Arc<WorkQueue<F>>) -> Result<Vec<(usize, T)>, RunError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut completed = Vec::new();
    while let Some((index, operation)) = queue.claim() {
        match operation().await {
            Ok(value) => completed.push((index, value)),
            Err(source) => {
                queue.halt();
                return Err(RunError::Operation { index, source });
            }
        }
    }
    Ok(completed)
}

/// Operations waiting to be claimed.
///
/// The cursor only moves forward, so an index is handed out at most once even when
/// workers run on different threads.
struct WorkQueue<F> {
    operations: Vec<Mutex<Option<F>>>,
    cursor: AtomicUsize,
    halted: AtomicBool,
}

impl<F> WorkQueue<F> {
    fn new(operations: Vec<F>) -> Self {
        Self {
            operations: operations
                .into_iter()
                .map(|op| Mutex::new(Some(op)))
                .collect(),
            cursor: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
        }
    }

    fn claim(&self) -> Option<(usize, F)> {
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        let operation = self
            .operations
            .get(index)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some((index, operation))
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }
}
