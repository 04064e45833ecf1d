// src/evaluator/mod.rs
//! External evaluator abstraction.
//!
//! An evaluator receives (résumé text, job description, ordered criteria) and
//! returns an [`EvaluationResult`]. Keys may drift from the requested criteria
//! in case or outer dots; the scoring lookup absorbs that.

pub mod cache;
pub mod mock;
pub mod openai;
pub mod prompt;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use cache::CachingEvaluator;
pub use mock::{DisabledEvaluator, MockEvaluator};
pub use openai::OpenAiEvaluator;

use crate::config::EvaluatorConfig;
use crate::evaluation::EvaluationResult;

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        candidate_text: &str,
        job_description: &str,
        criteria: &[String],
    ) -> Result<EvaluationResult>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynEvaluator = Arc<dyn Evaluator>;

/// Factory: build an evaluator from resolved config.
///
/// * `mock`     → deterministic [`MockEvaluator`]
/// * `openai`   → OpenAI chat completions, cached + daily-limited
/// * `azure`    → Azure OpenAI deployment, cached + daily-limited
/// * otherwise  → [`DisabledEvaluator`] (every evaluation fails)
pub fn build_evaluator(cfg: &EvaluatorConfig) -> Result<DynEvaluator> {
    let ev: DynEvaluator = match cfg.provider.as_str() {
        "mock" => Arc::new(MockEvaluator::default()),
        "openai" => Arc::new(CachingEvaluator::new(
            OpenAiEvaluator::openai(cfg)?,
            cfg.cache_dir.clone(),
            cfg.daily_limit,
        )),
        "azure" => Arc::new(CachingEvaluator::new(
            OpenAiEvaluator::azure(cfg)?,
            cfg.cache_dir.clone(),
            cfg.daily_limit,
        )),
        _ => Arc::new(DisabledEvaluator),
    };
    info!(
        target: "evaluator",
        provider = ev.provider_name(),
        key_len = cfg.api_key.len(),
        "evaluator ready"
    );
    Ok(ev)
}
