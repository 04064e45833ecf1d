// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod evaluation;
pub mod evaluator;
pub mod extract;
pub mod metrics;
pub mod ranking;
pub mod scoring;
pub mod store;
pub mod telemetry;
pub mod upload;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::RankerConfig;
pub use crate::error::RankError;
pub use crate::ranking::{CandidateOutcome, RankRequest, Ranker};

use axum::Router;
use tracing::info;

/// Build the full service from `config/ranker.toml` (or `$RANKER_CONFIG_PATH`)
/// plus env overrides. Used by the Shuttle entrypoint and HTTP tests.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = RankerConfig::load_default()?;
    let state = AppState::from_config(&cfg)?;
    let metrics = metrics::Metrics::init()?;
    info!(
        target: "api",
        provider = %cfg.evaluator.provider,
        max_concurrent = cfg.max_concurrent_evaluations,
        "resume ranker configured"
    );
    Ok(router(state, Some(&metrics)))
}
