//! Deduplicating cache with per-entry time-to-live.
//!
//! Each key maps to at most one [`Entry`]:
//!
//! ```text
//!            call (miss)              success
//!   (none) --------------> Pending ------------> Settled --(ttl)--> (none)
//!                             |
//!                             +--- failure ---> (none)
//! ```
//!
//! Concurrent callers with equal arguments share the single pending invocation.
//! Failures are never stored; every waiter sees the operation's own error.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::task::AbortHandle;

use crate::clock::Instant;
use crate::task::{spawn_detached, spawn_timer};

type CachedFn<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Wrap `f` so that calls with equal arguments share results for `ttl`.
///
/// Arguments are the cache key; pass several arguments as a tuple. `f` runs without the
/// cache lock held, so it may call back into the same cache for other keys. When two
/// threads miss on the same key at once both may call `f`, but only the future that
/// registers first is ever polled.
pub fn memoize_with_ttl<F, Fut, A, T, E>(f: F, ttl: Duration) -> Memoized<A, T, E>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Memoized {
        inner: Arc::new(CacheInner {
            func: Box::new(move |args| f(args).boxed()),
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            }),
        }),
    }
}

/// A memoized operation. Cloning shares the same cache.
pub struct Memoized<A, T, E> {
    inner: Arc<CacheInner<A, T, E>>,
}

impl<A, T, E> Clone for Memoized<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<A, T, E> {
    func: CachedFn<A, T, E>,
    ttl: Duration,
    state: Mutex<CacheState<A, T, E>>,
}

struct CacheState<A, T, E> {
    entries: HashMap<A, Entry<T, E>>,
    next_generation: u64,
}

enum Entry<T, E> {
    Pending {
        generation: u64,
        outcome: SharedOutcome<T, E>,
    },
    Settled {
        generation: u64,
        value: T,
        expires_at: Instant,
        expiry: AbortHandle,
    },
}

impl<T, E> Entry<T, E> {
    fn generation(&self) -> u64 {
        match self {
            Self::Pending { generation, .. } | Self::Settled { generation, .. } => *generation,
        }
    }

    /// Cancel the expiry timer, if any. Pending waiters keep their shared outcome.
    fn retire(self) {
        if let Self::Settled { expiry, .. } = self {
            expiry.abort();
        }
    }
}

enum Lookup<T, E> {
    Hit(T),
    Shared(SharedOutcome<T, E>),
}

impl<A, T, E> Memoized<A, T, E>
where
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Look up or start the call for `args`.
    ///
    /// The cache is consulted (and a pending entry registered on a miss) when `call`
    /// is invoked, not when the returned future is first polled.
    pub fn call(&self, args: A) -> impl Future<Output = Result<T, E>> + Send + use<A, T, E> {
        let lookup = self.lookup(args);
        async move {
            match lookup {
                Lookup::Hit(value) => Ok(value),
                Lookup::Shared(outcome) => outcome.await,
            }
        }
    }

    /// Drop the entry for `args`. Returns whether one existed.
    ///
    /// Callers already waiting on a pending entry still receive its result, but the
    /// result is not stored.
    pub fn invalidate(&self, args: &A) -> bool {
        let removed = self.inner.lock().entries.remove(args);
        removed.map(Entry::retire).is_some()
    }

    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.lock().entries.drain().collect();
        tracing::debug!(entries = drained.len(), "Cache cleared");
        for (_, entry) in drained {
            entry.retire();
        }
    }

    /// Number of keys with a pending or settled entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn lookup(&self, args: A) -> Lookup<T, E> {
        if let Some(found) = self.inner.lock().find(&args) {
            return found;
        }

        // Build the invocation unlocked, then register it unless another caller won.
        let invocation = (self.inner.func)(args.clone());
        let mut state = self.inner.lock();
        if let Some(found) = state.find(&args) {
            tracing::trace!("Joining call registered while building ours");
            return found;
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        tracing::trace!(generation, "Cache miss");

        let mut guard = PendingGuard {
            cache: Arc::downgrade(&self.inner),
            key: Some(args.clone()),
            generation,
        };
        let populate = spawn_detached(async move {
            let result = invocation.await;
            guard.settle(&result);
            result
        });

        let outcome = populate.boxed().shared();
        state.entries.insert(
            args,
            Entry::Pending {
                generation,
                outcome: outcome.clone(),
            },
        );
        Lookup::Shared(outcome)
    }
}

impl<A, T, E> CacheState<A, T, E>
where
    A: Hash + Eq,
    T: Clone,
{
    /// A fresh value or an in-flight call for `args`. Drops an expired entry.
    fn find(&mut self, args: &A) -> Option<Lookup<T, E>> {
        let stale = match self.entries.get(args) {
            Some(Entry::Settled {
                value, expires_at, ..
            }) if *expires_at > Instant::now() => {
                tracing::trace!("Cache hit");
                return Some(Lookup::Hit(value.clone()));
            }
            Some(Entry::Pending { outcome, .. }) => {
                tracing::trace!("Joining in-flight call");
                return Some(Lookup::Shared(outcome.clone()));
            }
            // Expired but the timer has not run yet.
            Some(Entry::Settled { .. }) => true,
            None => false,
        };
        if stale && let Some(entry) = self.entries.remove(args) {
            entry.retire();
        }
        None
    }
}

/// Resolves a pending entry from inside its populating task.
///
/// If the operation panics the guard is dropped unsettled and removes the entry, so the
/// next call for the key starts over instead of joining a poisoned shared future.
struct PendingGuard<A, T, E>
where
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    cache: Weak<CacheInner<A, T, E>>,
    key: Option<A>,
    generation: u64,
}

impl<A, T, E> PendingGuard<A, T, E>
where
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn settle(&mut self, result: &Result<T, E>) {
        if let Some(key) = self.key.take()
            && let Some(cache) = self.cache.upgrade()
        {
            CacheInner::settle(&cache, key, self.generation, result);
        }
    }
}

impl<A, T, E> Drop for PendingGuard<A, T, E>
where
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take()
            && let Some(cache) = self.cache.upgrade()
        {
            tracing::debug!(generation = self.generation, "Cached call panicked; entry dropped");
            cache.expire(&key, self.generation);
        }
    }
}

impl<A, T, E> CacheInner<A, T, E>
where
    A: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, CacheState<A, T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the pending entry for `key`, unless it was invalidated meanwhile.
    fn settle(this: &Arc<Self>, key: A, generation: u64, result: &Result<T, E>) {
        let mut state = this.lock();
        let still_pending = matches!(
            state.entries.get(&key),
            Some(Entry::Pending { generation: current, .. }) if *current == generation
        );
        if !still_pending {
            tracing::trace!(generation, "Discarding result for detached entry");
            return;
        }

        match result {
            Ok(value) => {
                let cache: Weak<Self> = Arc::downgrade(this);
                let expired_key = key.clone();
                let expiry = spawn_timer(this.ttl, move || {
                    if let Some(cache) = cache.upgrade() {
                        cache.expire(&expired_key, generation);
                    }
                });
                state.entries.insert(
                    key,
                    Entry::Settled {
                        generation,
                        value: value.clone(),
                        expires_at: Instant::now() + this.ttl,
                        expiry,
                    },
                );
            }
            Err(_) => {
                state.entries.remove(&key);
                tracing::debug!(generation, "Cached call failed; entry dropped");
            }
        }
    }

    fn expire(&self, key: &A, generation: u64) {
        let mut state = self.lock();
        if state
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation() == generation)
        {
            state.entries.remove(key);
            tracing::trace!(generation, "Cache entry expired");
        }
    }
}

impl<A, T, E> Drop for CacheInner<A, T, E> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in state.entries.drain() {
            entry.retire();
        }
    }
}
