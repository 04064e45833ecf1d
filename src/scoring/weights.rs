//! Positional criterion weights.
//!
//! For `n` criteria the raw weights are `n, n-1, ..., 1` (first criterion is
//! the heaviest), rescaled so the vector sums to [`WEIGHT_TOTAL`].

use serde::Serialize;

/// Every weight vector sums to this constant.
pub const WEIGHT_TOTAL: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedCriterion {
    pub criterion: String,
    pub weight: f64,
}

/// Derive rescaled weights for criteria given in priority order.
///
/// Duplicated labels are weighted independently by position. An empty input
/// yields an empty vector; callers reject that case before scoring.
pub fn derive_weights<S: AsRef<str>>(criteria: &[S]) -> Vec<WeightedCriterion> {
    let n = criteria.len();
    if n == 0 {
        return Vec::new();
    }
    let raw_sum = (n * (n + 1) / 2) as f64;

    criteria
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let raw = (n - i) as f64;
            WeightedCriterion {
                criterion: c.as_ref().to_string(),
                weight: raw / raw_sum * WEIGHT_TOTAL,
            }
        })
        .collect()
}
