// src/store/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifier of one upload batch ("session") of candidate documents.
pub type SessionId = String;

/// Append-only ranking row. One per successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRecord {
    pub id: i64,
    pub identity: String,
    pub job_title: String, // normalized
    pub final_score: f64,
    pub submitter: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRankingRecord {
    pub identity: String,
    pub job_title: String,
    pub final_score: f64,
    pub submitter: String,
    pub created_at: DateTime<Utc>,
}

/// Extracted résumé text staged under an upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDocument {
    pub id: i64,
    pub session_id: SessionId,
    pub submitter: String,
    pub filename: String,
    pub identity: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidateDocument {
    pub filename: String,
    pub identity: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription {
    pub id: i64,
    pub submitter: String,
    pub job_title: String, // normalized
    pub jd_text: String,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of storing a job description for a title.
#[derive(Debug, Clone, PartialEq)]
pub enum JdInsert {
    Stored { session_id: SessionId },
    /// A JD for this title already exists and stays in use.
    Exists { existing: JobDescription },
}

/// Row counts removed by a bulk reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedCounts {
    pub sessions: usize,
    pub documents: usize,
    pub job_descriptions: usize,
    pub rankings: usize,
}
