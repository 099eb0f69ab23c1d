//! Trailing-call debouncing.
//!
//! Every call restarts a single timer. Only the timer that survives a full quiet
//! period of `delay` invokes the operation, with the arguments of the latest call.
//! What superseded callers observe is decided by [`SupersededPolicy`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use tempo_types::{DebounceError, SupersededPolicy};

use crate::task::spawn_timer;

type DebouncedFn<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type Waiter<T, E> = oneshot::Sender<Result<T, DebounceError<E>>>;

/// Debounce `f` by `delay` with the default [`SupersededPolicy::ShareFinal`].
pub fn debounce<F, Fut, A, T, E>(f: F, delay: Duration) -> Debounced<A, T, E>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    debounce_with_policy(f, delay, SupersededPolicy::default())
}

pub fn debounce_with_policy<F, Fut, A, T, E>(
    f: F,
    delay: Duration,
    policy: SupersededPolicy,
) -> Debounced<A, T, E>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    Debounced {
        inner: Arc::new(DebounceInner {
            func: Box::new(move |args| f(args).boxed()),
            delay,
            policy,
            slot: Mutex::new(Slot {
                pending: None,
                next_generation: 0,
            }),
        }),
    }
}

/// A debounced operation. Cloning shares the same timer slot.
pub struct Debounced<A, T, E> {
    inner: Arc<DebounceInner<A, T, E>>,
}

impl<A, T, E> Clone for Debounced<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct DebounceInner<A, T, E> {
    func: DebouncedFn<A, T, E>,
    delay: Duration,
    policy: SupersededPolicy,
    slot: Mutex<Slot<A, T, E>>,
}

struct Slot<A, T, E> {
    pending: Option<PendingCall<A, T, E>>,
    next_generation: u64,
}

/// The timer currently waiting out its quiet period.
struct PendingCall<A, T, E> {
    generation: u64,
    args: A,
    waiters: Vec<Waiter<T, E>>,
    timer: AbortHandle,
}

impl<A, T, E> Debounced<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Schedule a call with `args`, superseding any call still waiting.
    ///
    /// The timer is restarted when `call` is invoked, not when the returned future is
    /// first polled.
    ///
    /// # Errors
    ///
    /// - [`DebounceError::Operation`] if the surviving call's operation failed.
    /// - [`DebounceError::Superseded`] under [`SupersededPolicy::Reject`] when a later
    ///   call replaced this one.
    /// - [`DebounceError::Abandoned`] if the operation panicked or the runtime shut down.
    pub fn call(
        &self,
        args: A,
    ) -> impl Future<Output = Result<T, DebounceError<E>>> + Send + use<A, T, E> {
        let (tx, rx) = oneshot::channel();
        self.schedule(args, tx);
        async move { rx.await.unwrap_or(Err(DebounceError::Abandoned)) }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    #[must_use]
    pub fn policy(&self) -> SupersededPolicy {
        self.inner.policy
    }

    /// Whether a call is waiting out its quiet period.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    fn schedule(&self, args: A, waiter: Waiter<T, E>) {
        let mut slot = self.inner.lock();

        let mut waiters = Vec::new();
        if let Some(previous) = slot.pending.take() {
            previous.timer.abort();
            tracing::trace!(
                generation = previous.generation,
                policy = self.inner.policy.as_str(),
                "Superseding pending debounced call"
            );
            match self.inner.policy {
                SupersededPolicy::ShareFinal => waiters = previous.waiters,
                SupersededPolicy::Reject => {
                    for superseded in previous.waiters {
                        let _ = superseded.send(Err(DebounceError::Superseded));
                    }
                }
            }
        }
        waiters.push(waiter);

        let generation = slot.next_generation;
        slot.next_generation += 1;

        let inner = Arc::clone(&self.inner);
        let timer = spawn_timer(self.inner.delay, move || inner.fire(generation));
        slot.pending = Some(PendingCall {
            generation,
            args,
            waiters,
            timer,
        });
    }
}

impl<A, T, E> DebounceInner<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Slot<A, T, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Quiet period elapsed: invoke the operation for the surviving call.
    fn fire(&self, generation: u64) {
        // A call that arrived while this timer was waking up has already replaced it.
        let Some(call) = self
            .lock()
            .pending
            .take_if(|pending| pending.generation == generation)
        else {
            return;
        };

        tracing::debug!(
            generation,
            waiters = call.waiters.len(),
            "Debounce delay elapsed; invoking operation"
        );
        let invocation = (self.func)(call.args);
        let mut waiters = call.waiters;
        tokio::spawn(async move {
            let result = invocation.await.map_err(DebounceError::Operation);
            let last = waiters.pop();
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
            if let Some(last) = last {
                let _ = last.send(result);
            }
        });
    }
}
