//! # Deduplication Policy
//! Decides whether a `(candidate identity, job title)` pair needs a fresh
//! evaluation.
//!
//! States per key:
//! - `NoHistory`      : never scored → evaluate
//! - `RecentlyScored` : last record within the recency window → skip
//! - `Eligible`       : last record older than the window → evaluate again
//!
//! The check reads the ranking store and the insert happens later, after the
//! evaluator returns. [`KeyedLocks`] serializes that read-evaluate-insert span
//! per key so two concurrent requests for the same pair cannot both insert.
//! This holds within one process only; separate processes sharing a database
//! can still race.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::store::{RankingStore, StoreResult};

pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 30;

/// Upper bound for a configured window (100 years).
pub const MAX_RECENCY_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DedupState {
    NoHistory,
    RecentlyScored { last_scored_at: DateTime<Utc> },
    Eligible { last_scored_at: DateTime<Utc> },
}

impl DedupState {
    pub fn should_evaluate(&self) -> bool {
        !matches!(self, DedupState::RecentlyScored { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupPolicy {
    window: Duration,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::with_window_days(DEFAULT_RECENCY_WINDOW_DAYS)
    }
}

impl DedupPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Days outside `0..=MAX_RECENCY_WINDOW_DAYS` are clamped.
    pub fn with_window_days(days: i64) -> Self {
        Self::new(Duration::days(days.clamp(0, MAX_RECENCY_WINDOW_DAYS)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Pure transition: a record exactly `window` old is still recent.
    pub fn classify(&self, last_scored_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DedupState {
        match last_scored_at {
            None => DedupState::NoHistory,
            Some(last) if now.signed_duration_since(last) <= self.window => {
                DedupState::RecentlyScored { last_scored_at: last }
            }
            Some(last) => DedupState::Eligible { last_scored_at: last },
        }
    }

    /// Look up the latest record for the pair and classify it.
    pub fn check(
        &self,
        store: &dyn RankingStore,
        identity: &str,
        job_title: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<DedupState> {
        let last = store.latest_ranking(identity, job_title)?.map(|r| r.created_at);
        Ok(self.classify(last, now))
    }
}

/// Job titles are compared trimmed and lowercased.
pub fn normalize_job_title(raw: &str) -> String {
    raw.trim().to_lowercase()
}

type Key = (String, String);

/// Per-key async mutual exclusion for `(identity, job title)`.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

/// Held while a key is being checked, evaluated, and recorded.
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, identity: &str, job_title: &str) -> KeyGuard {
        let slot = {
            let mut map = self.inner.lock();
            // Drop slots nobody holds or waits on.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry((identity.to_string(), job_title.to_string()))
                .or_default()
                .clone()
        };
        KeyGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of keys currently tracked (held or awaited).
    pub fn tracked(&self) -> usize {
        self.inner.lock().len()
    }
}
