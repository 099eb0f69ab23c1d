//! Shared test utilities and fixtures
//!
//! Scripted backends with deterministic latency and failure patterns.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

use tempo_core::clock::after;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend}: {message}")]
pub struct BackendError {
    pub backend: &'static str,
    pub message: String,
}

/// Boxed operation so heterogeneous sources can share one `Vec`.
pub type BoxedOp<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, String>> + Send>;

/// A backend that fails its first `failures` requests, then succeeds.
#[derive(Debug, Clone)]
pub struct Backend {
    name: &'static str,
    latency: Duration,
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl Backend {
    pub fn reliable(name: &'static str, latency_ms: u64) -> Self {
        Self::flaky(name, latency_ms, 0)
    }

    pub fn flaky(name: &'static str, latency_ms: u64, failures: usize) -> Self {
        Self {
            name,
            latency: Duration::from_millis(latency_ms),
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn down(name: &'static str, latency_ms: u64) -> Self {
        Self::flaky(name, latency_ms, usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, key: u64) -> Result<String, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        after(self.latency).await;
        if n < self.failures {
            return Err(BackendError {
                backend: self.name,
                message: format!("request {} for key {key} failed", n + 1),
            });
        }
        Ok(format!("{}:{key}", self.name))
    }

    /// `get(key)` as a boxed operation with a stringly error.
    pub fn op(&self, key: u64) -> BoxedOp<String> {
        let backend = self.clone();
        Box::new(move || Box::pin(async move { backend.get(key).await.map_err(|e| e.to_string()) }))
    }
}
