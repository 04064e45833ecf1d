//! # Upload
//! Turns uploaded files into staged session records.
//!
//! A candidate batch always opens a new session for the submitter, which
//! hides every earlier batch from ranking. Files that cannot be read are
//! listed in `bad_files` and never fail the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::dedup::normalize_job_title;
use crate::error::RankError;
use crate::extract::{identity_or_default, DocumentFormat, TextExtractor};
use crate::metrics::BAD_FILES_TOTAL;
use crate::store::{JdInsert, NewCandidateDocument, SessionId, SqliteStore};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchUpload {
    pub session_id: SessionId,
    pub received: usize,
    pub stored: usize,
    pub bad_files: Vec<BadFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JdUpload {
    Success { job_title: String },
    /// An earlier JD for the same title stays in use.
    Exists { job_title: String },
}

async fn extract_one(extractor: &dyn TextExtractor, file: &UploadedFile) -> Result<String, String> {
    let format = DocumentFormat::from_filename(&file.filename)
        .ok_or_else(|| "unsupported file format".to_string())?;
    extractor
        .extract(&file.bytes, format)
        .await
        .map_err(|e| e.to_string())
}

/// Extract every file, then stage the readable ones as a new session.
pub async fn ingest_candidate_batch(
    extractor: &dyn TextExtractor,
    store: &Arc<SqliteStore>,
    submitter: &str,
    files: Vec<UploadedFile>,
    default_identity: &str,
    now: DateTime<Utc>,
) -> Result<BatchUpload, RankError> {
    let submitter = submitter.trim();
    if submitter.is_empty() {
        return Err(RankError::BadRequest("uploaded_by is required".into()));
    }

    let received = files.len();
    let mut docs = Vec::with_capacity(received);
    let mut bad_files = Vec::new();

    for file in files {
        match extract_one(extractor, &file).await {
            Ok(text) => docs.push(NewCandidateDocument {
                identity: identity_or_default(&text, default_identity),
                filename: file.filename,
                content: text,
            }),
            Err(reason) => {
                warn!(target: "ranker", filename = %file.filename, %reason, "skipping unreadable file");
                counter!(BAD_FILES_TOTAL).increment(1);
                bad_files.push(BadFile {
                    filename: file.filename,
                    reason,
                });
            }
        }
    }

    let stored = docs.len();
    let owner = submitter.to_string();
    let session_id = store
        .blocking(move |s| s.insert_candidate_batch(&owner, &docs, now))
        .await?;
    info!(
        target: "ranker",
        %session_id,
        received,
        stored,
        bad = bad_files.len(),
        "candidate batch uploaded"
    );

    Ok(BatchUpload {
        session_id,
        received,
        stored,
        bad_files,
    })
}

/// Store a job description under its normalized title (first one wins).
pub async fn ingest_job_description(
    extractor: &dyn TextExtractor,
    store: &Arc<SqliteStore>,
    submitter: &str,
    job_title: &str,
    file: UploadedFile,
    now: DateTime<Utc>,
) -> Result<JdUpload, RankError> {
    let title = normalize_job_title(job_title);
    if title.is_empty() {
        return Err(RankError::BadRequest("job_title is required".into()));
    }

    let jd_text = extract_one(extractor, &file)
        .await
        .map_err(|reason| RankError::UnreadableDocument {
            filename: file.filename.clone(),
            reason,
        })?;

    let (owner, stored_title) = (submitter.trim().to_string(), title.clone());
    let inserted = store
        .blocking(move |s| s.insert_job_description(&owner, &stored_title, &jd_text, now))
        .await?;
    match inserted {
        JdInsert::Stored { .. } => {
            info!(target: "ranker", job_title = %title, "job description stored");
            Ok(JdUpload::Success {
                job_title: job_title.trim().to_string(),
            })
        }
        JdInsert::Exists { .. } => Ok(JdUpload::Exists {
            job_title: job_title.trim().to_string(),
        }),
    }
}
