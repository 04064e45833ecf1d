//! Request-level errors surfaced to HTTP clients.
//!
//! Per-candidate problems (bad file, evaluator failure, missing criterion)
//! never become a `RankError`; they are reported inline next to successful
//! results.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("At least one criterion is required.")]
    EmptyCriteria,

    #[error("No job description found for '{job_title}'.")]
    NoJobDescription { job_title: String },

    #[error("No recent resumes found for '{submitter}'.")]
    NoCandidateBatch { submitter: String },

    #[error("No resumes found in the latest upload of '{submitter}'.")]
    EmptyCandidateBatch { submitter: String },

    #[error("Unsupported or unreadable document '{filename}': {reason}")]
    UnreadableDocument { filename: String, reason: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Upload exceeds the {limit_bytes}-byte request limit.")]
    UploadTooLarge { limit_bytes: usize },
}

impl RankError {
    pub fn status(&self) -> StatusCode {
        match self {
            RankError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RankError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RankError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(target: "api", error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
