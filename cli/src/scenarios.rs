//! Lab scenarios, one per coordination primitive.

use std::time::Duration;

use anyhow::{Result, anyhow};

use tempo_config::TempoConfig;
use tempo_core::clock::{Instant, after};
use tempo_core::{
    DebounceError, debounce_with_policy, execute_with_retry, memoize_with_ttl,
    race_first_success, run_bounded,
};

use crate::simulated::SimulatedRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Retry,
    Runner,
    Cache,
    Debounce,
    Race,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Retry,
        Scenario::Runner,
        Scenario::Cache,
        Scenario::Debounce,
        Scenario::Race,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Runner => "runner",
            Self::Cache => "cache",
            Self::Debounce => "debounce",
            Self::Race => "race",
        }
    }

    /// Parse a command-line selection: a scenario name or `all`.
    pub fn parse_selection(raw: &str) -> Result<Vec<Self>> {
        let wanted = raw.trim().to_ascii_lowercase();
        if wanted == "all" {
            return Ok(Self::ALL.to_vec());
        }
        Self::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == wanted)
            .map(|scenario| vec![scenario])
            .ok_or_else(|| {
                anyhow!(
                    "unknown scenario '{wanted}'; expected one of: retry, runner, cache, debounce, race, all"
                )
            })
    }

    /// Run the scenario and return a one-line summary.
    pub async fn run(self, config: &TempoConfig) -> Result<String> {
        let summary = match self {
            Self::Retry => retry(config).await?,
            Self::Runner => runner(config).await?,
            Self::Cache => cache(config).await?,
            Self::Debounce => debounced_search(config).await,
            Self::Race => race().await,
        };
        tracing::info!(scenario = self.as_str(), %summary, "Scenario finished");
        Ok(summary)
    }
}

async fn retry(config: &TempoConfig) -> Result<String> {
    let policy = config.retry_policy()?;
    let remote = SimulatedRemote::new("flaky-api", Duration::from_millis(80), 0.5);

    let result = execute_with_retry(
        || {
            let remote = remote.clone();
            async move { remote.fetch(1).await }
        },
        &policy,
    )
    .await;

    Ok(match result {
        Ok(outcome) => format!(
            "ok data={} attempts={} duration={}ms",
            outcome.data,
            outcome.attempts,
            outcome.duration_ms()
        ),
        Err(err) => format!("gave up after {} attempt(s): {err}", err.attempts()),
    })
}

async fn runner(config: &TempoConfig) -> Result<String> {
    let limit = config.runner_limit()?;
    let remote = SimulatedRemote::new("catalog", Duration::from_millis(50), 0.0);

    let pages: Vec<_> = (1..=10u64)
        .map(|page| {
            let remote = remote.clone();
            move || async move { remote.fetch(page).await }
        })
        .collect();

    let start = Instant::now();
    let results = run_bounded(pages, limit.get()).await?;
    Ok(format!(
        "{} pages with limit {} in {}ms (first={}, last={})",
        results.len(),
        limit.get(),
        start.elapsed().as_millis(),
        results.first().map_or("-", String::as_str),
        results.last().map_or("-", String::as_str),
    ))
}

async fn cache(config: &TempoConfig) -> Result<String> {
    let remote = SimulatedRemote::new("profiles", Duration::from_millis(60), 0.0);

    let backend = remote.clone();
    let profiles = memoize_with_ttl(
        move |id: u64| {
            let backend = backend.clone();
            async move { backend.fetch(id).await }
        },
        config.cache_ttl(),
    );

    let (a, b, c) = tokio::join!(profiles.call(5), profiles.call(5), profiles.call(5));
    a?;
    b?;
    c?;
    profiles.call(5).await?;
    profiles.call(10).await?;

    Ok(format!(
        "5 lookups over 2 keys reached the remote {} time(s) (ttl {}ms)",
        remote.requests(),
        profiles.ttl().as_millis()
    ))
}

async fn debounced_search(config: &TempoConfig) -> String {
    const KEYSTROKES: [&str; 5] = ["t", "te", "tem", "temp", "tempo"];

    let index = SimulatedRemote::new("search", Duration::from_millis(30), 0.0);

    let backend = index.clone();
    let search = debounce_with_policy(
        move |query: String| {
            let backend = backend.clone();
            async move {
                backend
                    .fetch(query.len() as u64)
                    .await
                    .map(|hit| format!("{query} -> {hit}"))
            }
        },
        config.debounce_delay(),
        config.superseded_policy(),
    );

    // Type faster than the debounce delay.
    let mut pending = Vec::with_capacity(KEYSTROKES.len());
    for prefix in KEYSTROKES {
        pending.push(search.call(prefix.to_string()));
        after(search.delay() / 4).await;
    }

    let mut superseded = 0;
    let mut last = String::from("-");
    for call in pending {
        match call.await {
            Ok(result) => last = result,
            Err(DebounceError::Superseded) => superseded += 1,
            Err(err) => last = err.to_string(),
        }
    }

    format!(
        "{} keystrokes -> {} search(es), {superseded} superseded, policy {}, last: {last}",
        KEYSTROKES.len(),
        index.requests(),
        search.policy().as_str(),
    )
}

async fn race() -> String {
    let mirrors = [
        SimulatedRemote::new("mirror-eu", Duration::from_millis(120), 0.3),
        SimulatedRemote::new("mirror-us", Duration::from_millis(40), 0.5),
        SimulatedRemote::new("mirror-ap", Duration::from_millis(200), 0.1),
    ];

    let fetches: Vec<_> = mirrors
        .iter()
        .cloned()
        .map(|mirror| move || async move { mirror.fetch(42).await })
        .collect();

    match race_first_success(fetches).await {
        Ok(win) => format!(
            "winner {} (source {}) -> {}",
            mirrors[win.source].name(),
            win.source,
            win.data
        ),
        Err(err) => {
            let reasons: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
            format!("all {} mirrors failed: {}", err.len(), reasons.join(", "))
        }
    }
}
