//! # Weighted Aggregator
//! Pure mapping `(weighted criteria, evaluation result) -> final score`.
//!
//! ```text
//! total = Σ weight(c) * score(c)          // score(c) = 0 when not returned
//! final = round((total / WEIGHT_TOTAL) / RANK_SCALE_DIVISOR, 2)
//! ```
//!
//! The first division yields the weighted mean on the evaluator's 0–100 scale,
//! the second maps it onto the 0–10 ranking scale. A criterion the evaluator
//! did not return contributes zero; remaining weights are not renormalized.

use serde::Serialize;
use tracing::warn;

use super::lookup::find_entry;
use super::weights::{derive_weights, WeightedCriterion, WEIGHT_TOTAL};
use crate::evaluation::{EvaluationResult, MAX_CRITERION_SCORE};

/// Maps the 0–100 evaluator scale onto the 0–10 ranking scale.
pub const RANK_SCALE_DIVISOR: f64 = 10.0;

const MAX_FINAL_SCORE: f64 = MAX_CRITERION_SCORE as f64 / RANK_SCALE_DIVISOR;

/// Per-criterion explainability row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub criterion: String,
    pub weight: f64,
    /// Evaluator key that matched, if any.
    pub matched_key: Option<String>,
    pub score: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// In `[0, 10]`, rounded to 2 decimals.
    pub final_score: f64,
    /// Raw `Σ weight * score` before scale conversion.
    pub total_weighted: f64,
    pub contributions: Vec<Contribution>,
    /// Criteria the evaluator did not return (in request order).
    pub missing: Vec<String>,
}

pub fn aggregate(weighted: &[WeightedCriterion], result: &EvaluationResult) -> ScoreBreakdown {
    let mut total = 0.0f64;
    let mut contributions = Vec::with_capacity(weighted.len());
    let mut missing = Vec::new();

    for wc in weighted {
        match find_entry(result, &wc.criterion) {
            Some((key, s)) => {
                total += wc.weight * f64::from(s.score);
                contributions.push(Contribution {
                    criterion: wc.criterion.clone(),
                    weight: wc.weight,
                    matched_key: Some(key.to_string()),
                    score: Some(s.score),
                    comment: Some(s.comment.clone()),
                });
            }
            None => {
                warn!(
                    target: "ranker",
                    criterion = %wc.criterion,
                    "criterion missing from evaluation result; contributes 0"
                );
                missing.push(wc.criterion.clone());
                contributions.push(Contribution {
                    criterion: wc.criterion.clone(),
                    weight: wc.weight,
                    matched_key: None,
                    score: None,
                    comment: None,
                });
            }
        }
    }

    let final_score = round2(total / WEIGHT_TOTAL / RANK_SCALE_DIVISOR).clamp(0.0, MAX_FINAL_SCORE);

    ScoreBreakdown {
        final_score,
        total_weighted: total,
        contributions,
        missing,
    }
}

/// Convenience: derive positional weights, then aggregate.
pub fn score_candidate<S: AsRef<str>>(criteria: &[S], result: &EvaluationResult) -> ScoreBreakdown {
    aggregate(&derive_weights(criteria), result)
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
