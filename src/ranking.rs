//! # Ranking Pipeline
//! `rank request → latest JD + latest session → one task per candidate → sorted outcomes`
//!
//! Request-level preconditions (criteria present, JD exists, session exists
//! and is non-empty) are checked before any evaluator call. After that, every
//! candidate runs in its own task; an evaluator or storage failure only marks
//! that candidate as `failed`.
//!
//! Per candidate, the span "dedup check → evaluate → append record" runs under
//! a per-key lock, so concurrent requests for the same identity and title
//! record at most one evaluation per recency window in this process. Store
//! reads and writes inside that span run on the blocking pool. A candidate
//! task that panics is reported as `failed`, never dropped from the response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dedup::{normalize_job_title, DedupPolicy, DedupState, KeyedLocks};
use crate::error::RankError;
use crate::evaluator::DynEvaluator;
use crate::metrics::{
    EVALUATIONS_TOTAL, EVALUATION_FAILURES_TOTAL, EVALUATION_MS, MISSING_CRITERIA_TOTAL,
    SKIPPED_TOTAL,
};
use crate::scoring::{derive_weights, aggregate, Contribution, WeightedCriterion};
use crate::store::{CandidateDocument, NewRankingRecord, RankingStore, SqliteStore};
use crate::telemetry::anon_id;

#[derive(Debug, Clone, Deserialize)]
pub struct CriterionInput {
    pub criterion: String,
}

/// Body of a ranking request. Criteria order is priority order.
#[derive(Debug, Clone, Deserialize)]
pub struct RankRequest {
    pub criteria_with_weights: Vec<CriterionInput>,
    pub uploaded_by: String,
    pub job_title: String,
}

impl RankRequest {
    pub fn new<S: Into<String>>(criteria: Vec<S>, uploaded_by: &str, job_title: &str) -> Self {
        Self {
            criteria_with_weights: criteria
                .into_iter()
                .map(|c| CriterionInput { criterion: c.into() })
                .collect(),
            uploaded_by: uploaded_by.to_string(),
            job_title: job_title.to_string(),
        }
    }

    /// Trimmed, non-empty criteria labels in request order.
    pub fn criteria(&self) -> Vec<String> {
        self.criteria_with_weights
            .iter()
            .map(|c| c.criterion.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScore {
    pub criterion: String,
    pub weight: f64,
    pub score: Option<u8>,
    pub comment: Option<String>,
}

impl From<Contribution> for SectionScore {
    fn from(c: Contribution) -> Self {
        Self {
            criterion: c.criterion,
            weight: c.weight,
            score: c.score,
            comment: c.comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Processed {
        filename: String,
        email: String,
        weighted_score: f64,
        section_scores: Vec<SectionScore>,
        missing_criteria: Vec<String>,
        evaluation_summary: String,
        job_title: String,
    },
    Skipped {
        filename: String,
        email: String,
        last_scored_at: DateTime<Utc>,
        message: String,
    },
    Failed {
        filename: String,
        email: String,
        message: String,
    },
}

impl CandidateOutcome {
    /// Sort key: skipped and failed entries rank as 0.
    pub fn sort_score(&self) -> f64 {
        match self {
            CandidateOutcome::Processed { weighted_score, .. } => *weighted_score,
            _ => 0.0,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            CandidateOutcome::Processed { filename, .. }
            | CandidateOutcome::Skipped { filename, .. }
            | CandidateOutcome::Failed { filename, .. } => filename,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, CandidateOutcome::Processed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankResponse {
    pub ranked_resumes: Vec<CandidateOutcome>,
}

pub struct Ranker {
    store: Arc<SqliteStore>,
    evaluator: DynEvaluator,
    policy: DedupPolicy,
    locks: Arc<KeyedLocks>,
    limiter: Arc<Semaphore>,
}

// Everything one candidate task needs, cloned cheaply per task.
#[derive(Clone)]
struct TaskCtx {
    store: Arc<SqliteStore>,
    evaluator: DynEvaluator,
    policy: DedupPolicy,
    locks: Arc<KeyedLocks>,
    limiter: Arc<Semaphore>,
    weights: Arc<Vec<WeightedCriterion>>,
    criteria: Arc<Vec<String>>,
    jd_text: Arc<str>,
    job_title: Arc<str>,
    job_title_raw: Arc<str>,
    submitter: Arc<str>,
    now: DateTime<Utc>,
}

impl Ranker {
    pub fn new(
        store: Arc<SqliteStore>,
        evaluator: DynEvaluator,
        policy: DedupPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            evaluator,
            policy,
            locks: Arc::new(KeyedLocks::new()),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    pub async fn rank(&self, req: &RankRequest) -> Result<RankResponse, RankError> {
        self.rank_at(req, Utc::now()).await
    }

    /// Same as [`Ranker::rank`] with an explicit clock.
    pub async fn rank_at(&self, req: &RankRequest, now: DateTime<Utc>) -> Result<RankResponse, RankError> {
        let criteria = req.criteria();
        if criteria.is_empty() {
            return Err(RankError::EmptyCriteria);
        }
        let job_title = normalize_job_title(&req.job_title);
        let submitter = req.uploaded_by.trim().to_string();

        let (title, owner) = (job_title.clone(), submitter.clone());
        let (jd, batch) = self
            .store
            .blocking(move |s| {
                let jd = s.latest_job_description(&title)?;
                let batch = match s.latest_session(&owner)? {
                    Some(id) => {
                        let docs = s.session_documents(&owner, &id)?;
                        Some((id, docs))
                    }
                    None => None,
                };
                Ok((jd, batch))
            })
            .await?;

        let jd = jd.ok_or_else(|| RankError::NoJobDescription {
            job_title: req.job_title.trim().to_string(),
        })?;
        let (session_id, docs) = batch.ok_or_else(|| RankError::NoCandidateBatch {
            submitter: submitter.clone(),
        })?;
        if docs.is_empty() {
            return Err(RankError::EmptyCandidateBatch { submitter });
        }

        info!(
            target: "ranker",
            job_title = %job_title,
            %session_id,
            candidates = docs.len(),
            criteria = criteria.len(),
            provider = self.evaluator.provider_name(),
            "ranking started"
        );

        let ctx = TaskCtx {
            store: self.store.clone(),
            evaluator: self.evaluator.clone(),
            policy: self.policy,
            locks: self.locks.clone(),
            limiter: self.limiter.clone(),
            weights: Arc::new(derive_weights(&criteria)),
            criteria: Arc::new(criteria),
            jd_text: Arc::from(jd.jd_text),
            job_title: Arc::from(job_title),
            job_title_raw: Arc::from(req.job_title.trim()),
            submitter: Arc::from(submitter),
            now,
        };

        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(docs.len());
        for doc in docs {
            let label = (doc.filename.clone(), doc.identity.clone());
            let handle = tasks.spawn(evaluate_candidate(ctx.clone(), doc));
            pending.insert(handle.id(), label);
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => outcomes.push(outcome),
                Err(e) => {
                    error!(target: "ranker", error = %e, "candidate task aborted");
                    if let Some((filename, identity)) = pending.remove(&e.id()) {
                        counter!(EVALUATION_FAILURES_TOTAL).increment(1);
                        outcomes.push(CandidateOutcome::Failed {
                            filename,
                            email: identity,
                            message: "candidate evaluation aborted unexpectedly".into(),
                        });
                    }
                }
            }
        }

        outcomes.sort_by(|a, b| b.sort_score().total_cmp(&a.sort_score()));

        info!(
            target: "ranker",
            processed = outcomes.iter().filter(|o| o.is_processed()).count(),
            total = outcomes.len(),
            "ranking finished"
        );
        Ok(RankResponse {
            ranked_resumes: outcomes,
        })
    }
}

async fn evaluate_candidate(ctx: TaskCtx, doc: CandidateDocument) -> CandidateOutcome {
    let who = anon_id(&doc.identity);
    let _key = ctx.locks.lock(&doc.identity, &ctx.job_title).await;

    let (policy, identity, title, now) = (
        ctx.policy,
        doc.identity.clone(),
        ctx.job_title.clone(),
        ctx.now,
    );
    let lookup = ctx
        .store
        .blocking(move |s| policy.check(s, &identity, &title, now))
        .await;
    let state = match lookup {
        Ok(s) => s,
        Err(e) => return failed(doc, format!("dedup lookup failed: {e}")),
    };

    if let DedupState::RecentlyScored { last_scored_at } = state {
        debug!(target: "ranker", %who, %last_scored_at, "skipping recently scored candidate");
        counter!(SKIPPED_TOTAL).increment(1);
        let message = format!(
            "Resume for '{}' and job title '{}' was already scored within the recency window (on {}).",
            doc.identity,
            ctx.job_title_raw,
            last_scored_at.format("%Y-%m-%d")
        );
        return CandidateOutcome::Skipped {
            filename: doc.filename,
            email: doc.identity,
            last_scored_at,
            message,
        };
    }

    let started = Instant::now();
    let evaluation = {
        let _permit = match ctx.limiter.acquire().await {
            Ok(p) => p,
            Err(_) => return failed(doc, "evaluation limiter closed".into()),
        };
        ctx.evaluator
            .evaluate(&doc.content, &ctx.jd_text, &ctx.criteria)
            .await
    };
    histogram!(EVALUATION_MS).record(started.elapsed().as_secs_f64() * 1000.0);

    let evaluation = match evaluation {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "ranker", %who, error = %e, "evaluator failed for candidate");
            return failed(doc, format!("evaluation failed: {e}"));
        }
    };

    let breakdown = aggregate(&ctx.weights, &evaluation);
    if !breakdown.missing.is_empty() {
        counter!(MISSING_CRITERIA_TOTAL).increment(breakdown.missing.len() as u64);
    }

    let record = NewRankingRecord {
        identity: doc.identity.clone(),
        job_title: ctx.job_title.to_string(),
        final_score: breakdown.final_score,
        submitter: ctx.submitter.to_string(),
        created_at: ctx.now,
    };
    if let Err(e) = ctx.store.blocking(move |s| s.append_ranking(&record)).await {
        return failed(doc, format!("recording score failed: {e}"));
    }
    counter!(EVALUATIONS_TOTAL).increment(1);
    debug!(target: "ranker", %who, score = breakdown.final_score, "candidate scored");

    CandidateOutcome::Processed {
        filename: doc.filename,
        email: doc.identity,
        weighted_score: breakdown.final_score,
        section_scores: breakdown.contributions.into_iter().map(SectionScore::from).collect(),
        missing_criteria: breakdown.missing,
        evaluation_summary: evaluation.summary_comment.unwrap_or_default(),
        job_title: ctx.job_title_raw.to_string(),
    }
}

fn failed(doc: CandidateDocument, message: String) -> CandidateOutcome {
    counter!(EVALUATION_FAILURES_TOTAL).increment(1);
    CandidateOutcome::Failed {
        filename: doc.filename,
        email: doc.identity,
        message,
    }
}
