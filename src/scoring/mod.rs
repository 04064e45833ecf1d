// src/scoring/mod.rs
//! Scoring core: positional criterion weights, tolerant criterion lookup, and
//! the weighted aggregate that turns 0–100 evaluator scores into a 0–10 rank.

pub mod aggregate;
pub mod lookup;
pub mod weights;

pub use aggregate::{aggregate, score_candidate, Contribution, ScoreBreakdown, RANK_SCALE_DIVISOR};
pub use lookup::{find_entry, lookup_score, normalize_criterion};
pub use weights::{derive_weights, WeightedCriterion, WEIGHT_TOTAL};
