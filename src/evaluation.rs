//! # Evaluation Result
//! What an evaluator hands back for one candidate: a per-criterion score
//! (0–100) with a short comment, plus an optional overall summary.
//!
//! Entries keep the evaluator's own key order. Lookup picks the *first* key
//! that normalizes to the requested criterion, so order is part of the contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Key the evaluator uses for its overall comment.
pub const SUMMARY_KEY: &str = "summary_comment";

/// Highest score an evaluator may assign to a single criterion.
pub const MAX_CRITERION_SCORE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// `(key as returned by the evaluator, score)` in evaluator order.
    pub entries: Vec<(String, CriterionScore)>,
    #[serde(default)]
    pub summary_comment: Option<String>,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by mocks and tests.
    pub fn with(mut self, key: impl Into<String>, score: u8, comment: impl Into<String>) -> Self {
        self.entries.push((
            key.into(),
            CriterionScore {
                score: score.min(MAX_CRITERION_SCORE),
                comment: comment.into(),
            },
        ));
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary_comment = Some(summary.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Parse the raw JSON object produced by an LLM function call.
    ///
    /// Accepted shape:
    /// `{ "<criterion>": { "score": 0..=100, "comment": "..." }, ..., "summary_comment": "..." }`
    ///
    /// Out-of-range scores are clamped; entries that are not objects or lack a
    /// numeric score are dropped (and will later count as missing criteria).
    pub fn from_json(value: &Value) -> anyhow::Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("evaluation result must be a JSON object"))?;

        let mut out = Self::new();
        for (key, v) in obj {
            if key == SUMMARY_KEY {
                out.summary_comment = v.as_str().map(str::to_string);
                continue;
            }
            let Some(entry) = v.as_object() else {
                warn!(target: "evaluator", key = %key, "dropping non-object criterion entry");
                continue;
            };
            let Some(raw) = entry.get("score").and_then(Value::as_f64) else {
                warn!(target: "evaluator", key = %key, "dropping criterion entry without numeric score");
                continue;
            };
            let comment = entry
                .get("comment")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            out.entries.push((
                key.clone(),
                CriterionScore {
                    score: clamp_score(key, raw),
                    comment,
                },
            ));
        }
        Ok(out)
    }
}

fn clamp_score(key: &str, raw: f64) -> u8 {
    let max = f64::from(MAX_CRITERION_SCORE);
    if !(0.0..=max).contains(&raw) {
        warn!(target: "evaluator", key = %key, raw, "criterion score out of range; clamping");
    }
    raw.round().clamp(0.0, max) as u8
}
