//! Caching evaluator wrapper: file cache + persisted daily call limit.
//!
//! Identical (résumé, job description, criteria) triples are answered from
//! disk. Only real provider calls count against the daily limit. A call takes
//! its quota slot before reaching the provider and gives it back if the call
//! fails or is cancelled, so concurrent callers can never overshoot the limit.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::Evaluator;
use crate::evaluation::EvaluationResult;

pub struct CachingEvaluator<E: Evaluator> {
    inner: E,
    cache_dir: PathBuf,
    quota: Arc<DailyQuota>,
}

impl<E: Evaluator> CachingEvaluator<E> {
    pub fn new(inner: E, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(target: "evaluator", error = %e, dir = %cache_dir.display(), "cannot create cache dir");
        }
        let quota = Arc::new(DailyQuota::open(&cache_dir, daily_limit_max));
        Self {
            inner,
            cache_dir,
            quota,
        }
    }

    /// Real provider calls made (or in flight) today.
    pub fn calls_today(&self) -> u32 {
        self.quota.used_today()
    }
}

#[async_trait]
impl<E: Evaluator> Evaluator for CachingEvaluator<E> {
    async fn evaluate(
        &self,
        candidate_text: &str,
        job_description: &str,
        criteria: &[String],
    ) -> Result<EvaluationResult> {
        let key = cache_key(self.inner.provider_name(), candidate_text, job_description, criteria);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            debug!(target: "evaluator", %key, "evaluation cache hit");
            return Ok(hit);
        }

        let Some(slot) = DailyQuota::try_reserve(&self.quota) else {
            bail!("daily evaluator limit reached ({})", self.quota.limit);
        };
        let fresh = self
            .inner
            .evaluate(candidate_text, job_description, criteria)
            .await?;
        slot.commit();

        if let Err(e) = write_cache_file(&self.cache_dir, &key, &fresh) {
            warn!(target: "evaluator", error = %e, "failed to write evaluation cache");
        }
        Ok(fresh)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// ------------------------------------------------------------
// File cache
// ------------------------------------------------------------

fn cache_key(provider: &str, resume: &str, jd: &str, criteria: &[String]) -> String {
    let mut h = Sha256::new();
    for part in [provider, resume, jd] {
        h.update(part.as_bytes());
        h.update([0x1f]);
    }
    for c in criteria {
        h.update(c.as_bytes());
        h.update([0x1e]);
    }
    h.finalize()
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<EvaluationResult> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &EvaluationResult) -> io::Result<()> {
    write_json_atomic(&cache_path(dir, key), value)
}

/// Write through a sibling `.tmp` file and rename over the target.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)
}

// ------------------------------------------------------------
// Daily quota
// ------------------------------------------------------------

/// Calls taken on one UTC day, as stored in `daily_count.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct QuotaDay {
    date: NaiveDate,
    count: u32,
}

impl QuotaDay {
    fn starting(date: NaiveDate) -> Self {
        Self { date, count: 0 }
    }

    fn roll_to(&mut self, today: NaiveDate) {
        if self.date != today {
            *self = Self::starting(today);
        }
    }
}

/// Per-day budget of real provider calls, persisted in the cache dir.
struct DailyQuota {
    path: PathBuf,
    limit: u32,
    day: Mutex<QuotaDay>,
}

impl DailyQuota {
    fn open(dir: &Path, limit: u32) -> Self {
        let path = dir.join("daily_count.json");
        let day = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<QuotaDay>(&s).ok())
            .unwrap_or_else(|| QuotaDay::starting(today()));
        Self {
            path,
            limit,
            day: Mutex::new(day),
        }
    }

    fn used_today(&self) -> u32 {
        let mut day = self.day.lock();
        day.roll_to(today());
        day.count
    }

    /// Take one call off today's budget, or `None` when it is spent.
    fn try_reserve(quota: &Arc<Self>) -> Option<QuotaSlot> {
        let mut day = quota.day.lock();
        day.roll_to(today());
        if day.count >= quota.limit {
            return None;
        }
        day.count += 1;
        quota.persist(&day);
        Some(QuotaSlot {
            quota: quota.clone(),
            date: day.date,
            committed: false,
        })
    }

    fn refund(&self, date: NaiveDate) {
        let mut day = self.day.lock();
        // A slot from a previous day has nothing left to give back.
        if day.date == date && day.count > 0 {
            day.count -= 1;
            self.persist(&day);
        }
    }

    fn persist(&self, day: &QuotaDay) {
        if let Err(e) = write_json_atomic(&self.path, day) {
            warn!(target: "evaluator", error = %e, "failed to persist daily evaluator count");
        }
    }
}

/// A reserved call. Dropped without [`QuotaSlot::commit`] it is refunded.
struct QuotaSlot {
    quota: Arc<DailyQuota>,
    date: NaiveDate,
    committed: bool,
}

impl QuotaSlot {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for QuotaSlot {
    fn drop(&mut self) {
        if !self.committed {
            self.quota.refund(self.date);
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
