//! Criterion lookup in an evaluator result.
//!
//! Evaluators drift on casing and sometimes add or drop a leading dot
//! (".NET" vs "net"). Matching therefore compares a normalized form:
//! leading/trailing literal `.` stripped, then lowercased. Nothing else is
//! touched, so interior dots and whitespace still distinguish keys.

use crate::evaluation::{CriterionScore, EvaluationResult};

/// Normalized form used on both sides of a lookup.
pub fn normalize_criterion(label: &str) -> String {
    label.trim_matches('.').to_lowercase()
}

/// First entry (in evaluator order) whose key normalizes to `criterion`.
pub fn find_entry<'a>(
    result: &'a EvaluationResult,
    criterion: &str,
) -> Option<(&'a str, &'a CriterionScore)> {
    let wanted = normalize_criterion(criterion);
    result
        .entries
        .iter()
        .find(|(key, _)| normalize_criterion(key) == wanted)
        .map(|(key, score)| (key.as_str(), score))
}

/// Score for `criterion`, or `None` when the evaluator did not return it.
pub fn lookup_score(result: &EvaluationResult, criterion: &str) -> Option<u8> {
    find_entry(result, criterion).map(|(_, s)| s.score)
}
