//! `SQLite` audit store for finished research sessions.
//!
//! Persists one row per session: queryable summary columns plus the full
//! session as JSON. Saving is optional and never influences the research
//! outcome.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::research::session::ResearchSession;

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".hresearch/sessions.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    status TEXT NOT NULL,
    hierarchical INTEGER NOT NULL,
    sub_questions INTEGER NOT NULL DEFAULT 0,
    iterations INTEGER NOT NULL DEFAULT 0,
    findings INTEGER NOT NULL DEFAULT 0,
    sources INTEGER NOT NULL DEFAULT 0,
    cost_spent REAL NOT NULL DEFAULT 0,
    elapsed_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    session_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);
";

/// One row of the session history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// The researched query.
    pub query: String,
    /// Final status.
    pub status: String,
    /// Whether the session ran hierarchically to the end.
    pub hierarchical: bool,
    /// Sub-questions created.
    pub sub_questions: usize,
    /// Research iterations executed.
    pub iterations: usize,
    /// Validated findings.
    pub findings: usize,
    /// Validated sources.
    pub sources: usize,
    /// Total spend.
    pub cost_spent: f64,
    /// Wall-clock duration.
    pub elapsed_ms: u64,
    /// When the session was saved (UTC, `SQLite` timestamp format).
    pub created_at: String,
}

/// Session store backed by a single `SQLite` file.
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Opens (creating if needed) the database at `path` and its parent
    /// directory, and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory or database cannot be
    /// created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if `SQLite` fails to initialize.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    /// Creates the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on SQL failure.
    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Saves `session`, replacing any earlier copy with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the insert fails.
    pub fn save(&self, session: &ResearchSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let metadata = session.metadata();
        self.conn.execute(
            "INSERT INTO sessions
             (id, query, status, hierarchical, sub_questions, iterations, findings,
              sources, cost_spent, elapsed_ms, session_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
             status = excluded.status,
             hierarchical = excluded.hierarchical,
             sub_questions = excluded.sub_questions,
             iterations = excluded.iterations,
             findings = excluded.findings,
             sources = excluded.sources,
             cost_spent = excluded.cost_spent,
             elapsed_ms = excluded.elapsed_ms,
             session_json = excluded.session_json",
            params![
                session.id().to_string(),
                session.query(),
                session.status().as_str(),
                session.hierarchical(),
                to_i64(session.sub_questions().len()),
                to_i64(session.global_iteration()),
                to_i64(session.findings().len()),
                to_i64(session.sources().len()),
                metadata.cost_spent,
                i64::try_from(metadata.elapsed_ms).unwrap_or(i64::MAX),
                json,
            ],
        )?;
        debug!(session_id = %session.id(), "session saved");
        Ok(())
    }

    /// Lists saved sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on SQL failure.
    pub fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, query, status, hierarchical, sub_questions, iterations, findings,
                    sources, cost_spent, elapsed_ms, created_at
             FROM sessions ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![to_i64(limit)], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                query: row.get(1)?,
                status: row.get(2)?,
                hierarchical: row.get(3)?,
                sub_questions: to_usize(row.get(4)?),
                iterations: to_usize(row.get(5)?),
                findings: to_usize(row.get(6)?),
                sources: to_usize(row.get(7)?),
                cost_spent: row.get(8)?,
                elapsed_ms: u64::try_from(row.get::<_, i64>(9)?).unwrap_or(0),
                created_at: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Loads the full session with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no session has that id, or
    /// [`StoreError::Serialization`] if the stored JSON is unreadable.
    pub fn get(&self, id: &str) -> Result<ResearchSession, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT session_json FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}
