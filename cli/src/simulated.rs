//! Simulated remote sources with configurable latency and failure rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;

use tempo_core::clock::after;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_name} failed to serve request {request}")]
pub struct RemoteError {
    pub source_name: &'static str,
    pub request: u64,
}

/// A remote endpoint. Cloning shares the request counter.
#[derive(Debug, Clone)]
pub struct SimulatedRemote {
    name: &'static str,
    latency: Duration,
    failure_rate: f64,
    requests: Arc<AtomicU32>,
}

impl SimulatedRemote {
    pub fn new(name: &'static str, latency: Duration, failure_rate: f64) -> Self {
        Self {
            name,
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            requests: Arc::new(AtomicU32::new(0)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of requests that reached this remote.
    #[must_use]
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Serve `request` after the remote's latency, with up to 25% up-jitter.
    pub async fn fetch(&self, request: u64) -> Result<String, RemoteError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let jitter = 1.0 + rand::random::<f64>() * 0.25;
        after(self.latency.mul_f64(jitter)).await;

        if rand::random::<f64>() < self.failure_rate {
            tracing::debug!(remote = self.name, request, "Simulated failure");
            return Err(RemoteError {
                source_name: self.name,
                request,
            });
        }
        Ok(format!("{}#{request}", self.name))
    }
}
