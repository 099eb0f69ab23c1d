//! Tempo lab - exercises each coordination primitive against simulated remotes.
//!
//! ```text
//! tempo-lab [retry|runner|cache|debounce|race|all]
//! ```
//!
//! Policies come from the Tempo config file (see `tempo_config`); logging is controlled
//! with `RUST_LOG` and written to stderr, leaving stdout for scenario summaries.

mod scenarios;
mod simulated;

use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tempo_config::TempoConfig;

use crate::scenarios::Scenario;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let selected = match env::args().nth(1) {
        Some(arg) => Scenario::parse_selection(&arg)?,
        None => Scenario::ALL.to_vec(),
    };

    let config = TempoConfig::load()
        .context("loading Tempo config")?
        .unwrap_or_default();
    if let Some(path) = TempoConfig::path().filter(|path| path.exists()) {
        tracing::info!(path = %path.display(), "Using config file");
    }

    for scenario in selected {
        let summary = scenario
            .run(&config)
            .await
            .with_context(|| format!("running {} scenario", scenario.as_str()))?;
        println!("{:<9} {summary}", scenario.as_str());
    }

    Ok(())
}
