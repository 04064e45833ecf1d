//! Deterministic evaluators for tests and local runs.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::Evaluator;
use crate::evaluation::EvaluationResult;
use crate::scoring::normalize_criterion;

/// Echoes every requested criterion back with a fixed score.
///
/// `overrides` are keyed by normalized criterion. A résumé containing
/// `fail_marker` makes the call fail, which lets tests exercise per-candidate
/// failure isolation.
#[derive(Debug, Clone)]
pub struct MockEvaluator {
    pub default_score: u8,
    pub overrides: HashMap<String, u8>,
    pub omit: Vec<String>,
    pub fail_marker: Option<String>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self {
            default_score: 70,
            overrides: HashMap::new(),
            omit: Vec::new(),
            fail_marker: None,
        }
    }
}

impl MockEvaluator {
    pub fn with_score(mut self, criterion: &str, score: u8) -> Self {
        self.overrides.insert(normalize_criterion(criterion), score);
        self
    }

    /// Leave `criterion` out of the result, as a drifting LLM might.
    pub fn omitting(mut self, criterion: &str) -> Self {
        self.omit.push(normalize_criterion(criterion));
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(
        &self,
        candidate_text: &str,
        _job_description: &str,
        criteria: &[String],
    ) -> Result<EvaluationResult> {
        if let Some(marker) = &self.fail_marker {
            if candidate_text.contains(marker.as_str()) {
                bail!("mock evaluator failure");
            }
        }
        let mut out = EvaluationResult::new().with_summary("Neutral evaluation (mock)");
        for c in criteria {
            let key = normalize_criterion(c);
            if self.omit.contains(&key) {
                continue;
            }
            let score = self.overrides.get(&key).copied().unwrap_or(self.default_score);
            out = out.with(c.clone(), score, "mock");
        }
        Ok(out)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails; used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEvaluator;

#[async_trait]
impl Evaluator for DisabledEvaluator {
    async fn evaluate(&self, _: &str, _: &str, _: &[String]) -> Result<EvaluationResult> {
        bail!("evaluator is disabled")
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}
