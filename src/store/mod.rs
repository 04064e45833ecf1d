// src/store/mod.rs
//! SQLite persistence: upload sessions, staged candidate documents, job
//! descriptions, and the append-only ranking history.
//!
//! Timestamps are stored as fixed-precision RFC 3339 UTC text so that lexical
//! order equals chronological order.
//!
//! Every method is synchronous and holds the connection mutex for the whole
//! statement. Async callers go through [`SqliteStore::blocking`], which runs
//! the work on tokio's blocking pool instead of a runtime worker.

pub mod schema;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

pub use types::{
    CandidateDocument, ClearedCounts, JdInsert, JobDescription, NewCandidateDocument,
    NewRankingRecord, RankingRecord, SessionId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid timestamp {value:?} in column {column}")]
    Timestamp { column: &'static str, value: String },

    #[error("storage task failed: {0}")]
    Background(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Query surface the ranking pipeline and dedup policy need.
pub trait RankingStore: Send + Sync {
    fn append_ranking(&self, record: &NewRankingRecord) -> StoreResult<i64>;

    /// Most recent record for `(identity, normalized job title)`.
    fn latest_ranking(&self, identity: &str, job_title: &str) -> StoreResult<Option<RankingRecord>>;

    /// All records for a normalized title, best score first.
    fn rankings_for_title(&self, job_title: &str) -> StoreResult<Vec<RankingRecord>>;

    /// Bulk delete of the ranking history. Returns rows removed.
    fn clear_rankings(&self) -> StoreResult<usize>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file, applying pragmas and migrations.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::apply_pragmas(&conn)?;
        schema::migrate(&conn)?;
        info!(target: "store", path = %path.display(), "sqlite store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database (tests, demos).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against this store on the blocking thread pool.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> StoreResult<T>
    where
        F: FnOnce(&SqliteStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))?
    }

    // ------------------------------------------------------------
    // Upload sessions
    // ------------------------------------------------------------

    /// Create a new session for `submitter` and stage its documents in one
    /// transaction. The session exists even when `docs` is empty, so a batch
    /// whose files all failed extraction still supersedes the previous one.
    pub fn insert_candidate_batch(
        &self,
        submitter: &str,
        docs: &[NewCandidateDocument],
        now: DateTime<Utc>,
    ) -> StoreResult<SessionId> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let ts = encode_ts(now);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO upload_sessions (session_id, submitter, created_at) VALUES (?1, ?2, ?3)",
            params![session_id, submitter, ts],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO candidate_documents
                    (session_id, submitter, filename, identity, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for d in docs {
                stmt.execute(params![session_id, submitter, d.filename, d.identity, d.content, ts])?;
            }
        }
        tx.commit()?;

        debug!(target: "store", %session_id, docs = docs.len(), "candidate batch staged");
        Ok(session_id)
    }

    /// Latest session of a submitter; older ones stay stored but unreachable.
    pub fn latest_session(&self, submitter: &str) -> StoreResult<Option<SessionId>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT session_id FROM upload_sessions
                 WHERE submitter = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![submitter],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn session_documents(
        &self,
        submitter: &str,
        session_id: &str,
    ) -> StoreResult<Vec<CandidateDocument>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, submitter, filename, identity, content, created_at
             FROM candidate_documents
             WHERE submitter = ?1 AND session_id = ?2
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![submitter, session_id], raw_document)?;
        rows.map(|r| r?.decode()).collect()
    }

    // ------------------------------------------------------------
    // Job descriptions
    // ------------------------------------------------------------

    /// Store a JD unless one already exists for the (normalized) title, in
    /// which case the existing one is kept and returned.
    pub fn insert_job_description(
        &self,
        submitter: &str,
        job_title: &str,
        jd_text: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<JdInsert> {
        let conn = self.conn.lock();
        if let Some(existing) = latest_jd_locked(&conn, job_title)? {
            return Ok(JdInsert::Exists { existing });
        }
        let session_id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO job_descriptions (submitter, job_title, jd_text, session_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![submitter, job_title, jd_text, session_id, encode_ts(now)],
        )?;
        Ok(JdInsert::Stored { session_id })
    }

    pub fn latest_job_description(&self, job_title: &str) -> StoreResult<Option<JobDescription>> {
        let conn = self.conn.lock();
        latest_jd_locked(&conn, job_title)
    }

    /// Distinct stored titles, optionally filtered by a case-insensitive substring.
    pub fn job_titles(&self, query: Option<&str>) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT job_title FROM job_descriptions
             WHERE job_title <> '' AND (?1 = '' OR instr(job_title, ?1) > 0)
             ORDER BY job_title",
        )?;
        let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
        let rows = stmt.query_map(params![needle], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Bulk reset of every table.
    pub fn clear_all(&self) -> StoreResult<ClearedCounts> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let counts = ClearedCounts {
            documents: tx.execute("DELETE FROM candidate_documents", [])?,
            sessions: tx.execute("DELETE FROM upload_sessions", [])?,
            job_descriptions: tx.execute("DELETE FROM job_descriptions", [])?,
            rankings: tx.execute("DELETE FROM rankings", [])?,
        };
        tx.commit()?;
        info!(target: "store", ?counts, "store cleared");
        Ok(counts)
    }
}

impl RankingStore for SqliteStore {
    fn append_ranking(&self, record: &NewRankingRecord) -> StoreResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO rankings (identity, job_title, final_score, submitter, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.identity,
                record.job_title,
                record.final_score,
                record.submitter,
                encode_ts(record.created_at)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_ranking(&self, identity: &str, job_title: &str) -> StoreResult<Option<RankingRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, identity, job_title, final_score, submitter, created_at
                 FROM rankings
                 WHERE identity = ?1 AND job_title = ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![identity, job_title],
                raw_ranking,
            )
            .optional()?;
        raw.map(RawRanking::decode).transpose()
    }

    fn rankings_for_title(&self, job_title: &str) -> StoreResult<Vec<RankingRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, identity, job_title, final_score, submitter, created_at
             FROM rankings
             WHERE job_title = ?1
             ORDER BY final_score DESC, created_at DESC",
        )?;
        let rows = stmt.query_map(params![job_title], raw_ranking)?;
        rows.map(|r| r?.decode()).collect()
    }

    fn clear_rankings(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM rankings", [])?)
    }
}

// ------------------------------------------------------------
// Row helpers
// ------------------------------------------------------------

fn latest_jd_locked(conn: &Connection, job_title: &str) -> StoreResult<Option<JobDescription>> {
    let raw = conn
        .query_row(
            "SELECT id, submitter, job_title, jd_text, session_id, created_at
             FROM job_descriptions
             WHERE job_title = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            params![job_title],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    raw.map(|(id, submitter, job_title, jd_text, session_id, ts)| {
        Ok(JobDescription {
            id,
            submitter,
            job_title,
            jd_text,
            session_id,
            created_at: decode_ts("job_descriptions.created_at", ts)?,
        })
    })
    .transpose()
}

// Rows are read as plain columns first; timestamp decoding happens outside
// rusqlite's closure so it can report a StoreError.
struct RawRanking {
    id: i64,
    identity: String,
    job_title: String,
    final_score: f64,
    submitter: String,
    created_at: String,
}

impl RawRanking {
    fn decode(self) -> StoreResult<RankingRecord> {
        Ok(RankingRecord {
            id: self.id,
            identity: self.identity,
            job_title: self.job_title,
            final_score: self.final_score,
            submitter: self.submitter,
            created_at: decode_ts("rankings.created_at", self.created_at)?,
        })
    }
}

fn raw_ranking(row: &Row<'_>) -> rusqlite::Result<RawRanking> {
    Ok(RawRanking {
        id: row.get(0)?,
        identity: row.get(1)?,
        job_title: row.get(2)?,
        final_score: row.get(3)?,
        submitter: row.get(4)?,
        created_at: row.get(5)?,
    })
}

struct RawDocument {
    id: i64,
    session_id: String,
    submitter: String,
    filename: String,
    identity: String,
    content: String,
    created_at: String,
}

impl RawDocument {
    fn decode(self) -> StoreResult<CandidateDocument> {
        Ok(CandidateDocument {
            id: self.id,
            session_id: self.session_id,
            submitter: self.submitter,
            filename: self.filename,
            identity: self.identity,
            content: self.content,
            created_at: decode_ts("candidate_documents.created_at", self.created_at)?,
        })
    }
}

fn raw_document(row: &Row<'_>) -> rusqlite::Result<RawDocument> {
    Ok(RawDocument {
        id: row.get(0)?,
        session_id: row.get(1)?,
        submitter: row.get(2)?,
        filename: row.get(3)?,
        identity: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(column: &'static str, value: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp { column, value })
}
