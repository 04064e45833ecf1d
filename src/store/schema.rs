//! Tables, indexes, and connection pragmas.

use rusqlite::Connection;

/// WAL + busy timeout so the API and admin routes can share one file.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
}

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS upload_sessions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL UNIQUE,
            submitter   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_submitter
            ON upload_sessions(submitter, created_at);

        CREATE TABLE IF NOT EXISTS candidate_documents (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL REFERENCES upload_sessions(session_id) ON DELETE CASCADE,
            submitter   TEXT NOT NULL,
            filename    TEXT NOT NULL,
            identity    TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_session
            ON candidate_documents(submitter, session_id);

        CREATE TABLE IF NOT EXISTS job_descriptions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            submitter   TEXT NOT NULL,
            job_title   TEXT NOT NULL,
            jd_text     TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jd_title
            ON job_descriptions(job_title, created_at);

        CREATE TABLE IF NOT EXISTS rankings (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            identity     TEXT NOT NULL,
            job_title    TEXT NOT NULL,
            final_score  REAL NOT NULL,
            submitter    TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_rankings_key
            ON rankings(identity, job_title, created_at);
        CREATE INDEX IF NOT EXISTS idx_rankings_title_score
            ON rankings(job_title, final_score);
        ",
    )
}
