//! Detached tasks and cancellable timers.

use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};

use crate::clock::after;

/// Handle to work spawned on the runtime.
///
/// Awaiting yields the task's output. Dropping the handle detaches the task: it keeps
/// running and its output is discarded. A panic inside the task is resumed on the
/// awaiting caller.
pub(crate) struct Detached<T> {
    handle: JoinHandle<T>,
}

pub(crate) fn spawn_detached<F>(future: F) -> Detached<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Detached {
        handle: tokio::spawn(future),
    }
}

impl<T> Future for Detached<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            Poll::Ready(Err(err)) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            // Detached tasks are never aborted; this only happens during runtime shutdown.
            Poll::Ready(Err(err)) => panic!("detached task did not complete: {err}"),
        }
    }
}

/// Run `fire` once `delay` has elapsed, unless the returned handle is aborted first.
///
/// Aborting is a true cancellation while the timer is still waiting. Once `fire` has
/// started it runs to completion, so callers that race an abort against the timer
/// must re-check their own state inside `fire`.
pub(crate) fn spawn_timer<F>(delay: Duration, fire: F) -> AbortHandle
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        after(delay).await;
        fire();
    })
    .abort_handle()
}
