use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::RankerConfig;
use crate::dedup::{normalize_job_title, DedupPolicy};
use crate::error::RankError;
use crate::evaluator::{build_evaluator, DynEvaluator};
use crate::extract::{CommandExtractor, TextExtractor};
use crate::metrics::Metrics;
use crate::ranking::{RankRequest, RankResponse, Ranker};
use crate::store::{ClearedCounts, RankingRecord, RankingStore, SqliteStore};
use crate::upload::{ingest_candidate_batch, ingest_job_description, BadFile, JdUpload, UploadedFile};

#[derive(Clone)]
pub struct AppState {
    pub ranker: Arc<Ranker>,
    pub store: Arc<SqliteStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub default_identity: Arc<str>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        store: Arc<SqliteStore>,
        evaluator: DynEvaluator,
        extractor: Arc<dyn TextExtractor>,
        cfg: &RankerConfig,
    ) -> Self {
        let ranker = Ranker::new(
            store.clone(),
            evaluator,
            DedupPolicy::with_window_days(cfg.recency_window_days),
            cfg.max_concurrent_evaluations,
        );
        Self {
            ranker: Arc::new(ranker),
            store,
            extractor,
            default_identity: Arc::from(cfg.default_identity.as_str()),
            max_upload_bytes: cfg.max_upload_bytes,
        }
    }

    /// Open the database and build collaborators from resolved config.
    pub fn from_config(cfg: &RankerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::open(&cfg.database_path)?);
        let evaluator = build_evaluator(&cfg.evaluator)?;
        let extractor: Arc<dyn TextExtractor> = Arc::new(CommandExtractor::default());
        info!(
            target: "api",
            db = %cfg.database_path.display(),
            window_days = cfg.recency_window_days,
            max_upload_bytes = cfg.max_upload_bytes,
            extractor = extractor.name(),
            "app state ready"
        );
        Ok(Self::new(store, evaluator, extractor, cfg))
    }
}

/// Service routes. `metrics` adds `/metrics` when a recorder is installed.
/// Upload routes accept bodies up to `max_upload_bytes`; every other route
/// keeps axum's default limit.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let limit = state.max_upload_bytes;
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/upload-folder", post(upload_folder).layer(DefaultBodyLimit::max(limit)))
        .route("/upload-jd", post(upload_jd).layer(DefaultBodyLimit::max(limit)))
        .route("/rank-resumes", post(rank_resumes))
        .route("/records", get(records))
        .route("/job-titles", get(job_titles))
        .route("/admin/clear", post(admin_clear))
        .with_state(state);

    let app = match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    };
    app.layer(CorsLayer::very_permissive())
}

#[derive(Default)]
struct UploadForm {
    uploaded_by: Option<String>,
    job_title: Option<String>,
    files: Vec<UploadedFile>,
}

fn multipart_error(e: MultipartError, limit_bytes: usize, context: &str) -> RankError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RankError::UploadTooLarge { limit_bytes }
    } else {
        RankError::BadRequest(format!("invalid multipart {context}: {e}"))
    }
}

async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
    limit_bytes: usize,
) -> Result<UploadForm, RankError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_bytes, "body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bad = |e: MultipartError| multipart_error(e, limit_bytes, &format!("field '{name}'"));
        match name.as_str() {
            "uploaded_by" => form.uploaded_by = Some(field.text().await.map_err(bad)?),
            "job_title" => form.job_title = Some(field.text().await.map_err(bad)?),
            n if n == file_field => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let bytes = field.bytes().await.map_err(bad)?;
                form.files.push(UploadedFile::new(filename, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(form)
}

fn required(value: Option<String>, field: &str) -> Result<String, RankError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RankError::BadRequest(format!("{field} is required")))
}

#[derive(Serialize)]
struct UploadFolderResp {
    status: &'static str,
    session_id: String,
    uploaded_by: String,
    received: usize,
    stored: usize,
    bad_files: Vec<BadFile>,
}

async fn upload_folder(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadFolderResp>, RankError> {
    let form = read_form(multipart, "files", state.max_upload_bytes).await?;
    let uploaded_by = required(form.uploaded_by, "uploaded_by")?;

    let batch = ingest_candidate_batch(
        state.extractor.as_ref(),
        &state.store,
        &uploaded_by,
        form.files,
        &state.default_identity,
        Utc::now(),
    )
    .await?;

    Ok(Json(UploadFolderResp {
        status: "success",
        session_id: batch.session_id,
        uploaded_by,
        received: batch.received,
        stored: batch.stored,
        bad_files: batch.bad_files,
    }))
}

async fn upload_jd(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<JdUpload>, RankError> {
    let mut form = read_form(multipart, "jd_file", state.max_upload_bytes).await?;
    let uploaded_by = required(form.uploaded_by, "uploaded_by")?;
    let job_title = required(form.job_title, "job_title")?;
    if form.files.is_empty() {
        return Err(RankError::BadRequest("jd_file is required".into()));
    }
    let file = form.files.swap_remove(0);

    let out = ingest_job_description(
        state.extractor.as_ref(),
        &state.store,
        &uploaded_by,
        &job_title,
        file,
        Utc::now(),
    )
    .await?;
    Ok(Json(out))
}

async fn rank_resumes(
    State(state): State<AppState>,
    Json(req): Json<RankRequest>,
) -> Result<Json<RankResponse>, RankError> {
    let resp = state.ranker.rank(&req).await?;
    Ok(Json(resp))
}

#[derive(Deserialize)]
struct RecordsQuery {
    job_title: String,
}

async fn records(
    State(state): State<AppState>,
    Query(q): Query<RecordsQuery>,
) -> Result<Json<Vec<RankingRecord>>, RankError> {
    let title = normalize_job_title(&q.job_title);
    let rows = state.store.blocking(move |s| s.rankings_for_title(&title)).await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct TitlesQuery {
    #[serde(default)]
    query: Option<String>,
}

async fn job_titles(
    State(state): State<AppState>,
    Query(q): Query<TitlesQuery>,
) -> Result<Json<Vec<String>>, RankError> {
    let titles = state
        .store
        .blocking(move |s| s.job_titles(q.query.as_deref()))
        .await?;
    Ok(Json(titles))
}

#[derive(Serialize)]
struct ClearResp {
    status: &'static str,
    deleted: ClearedCounts,
}

async fn admin_clear(State(state): State<AppState>) -> Result<Json<ClearResp>, RankError> {
    let deleted = state.store.blocking(|s| s.clear_all()).await?;
    info!(target: "api", ?deleted, "all tables cleared");
    Ok(Json(ClearResp {
        status: "success",
        deleted,
    }))
}
