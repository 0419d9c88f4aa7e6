use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, BoxStream, StreamExt};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
pub mod memory;
pub mod models;
use models::*;

/// Failure talking to the score store. "Key not found" is never an error;
/// see [`ScoreLookup::Absent`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a single key lookup.
#[derive(Debug)]
pub enum ScoreLookup {
    Found(StoredScore),
    Absent,
    Failed(StoreError),
}

/// Durable, versioned fingerprint → score map.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get(&self, key: &ScoreFingerprint) -> ScoreLookup;

    /// Commit `value` under `key`, returning the store-assigned revision.
    async fn put(&self, key: &ScoreFingerprint, value: &str) -> Result<u64, StoreError>;

    /// Current value of every key, ordered by key.
    async fn entries(&self) -> Result<Vec<StoreEntry>, StoreError>;

    /// Retained revisions of one key, newest first.
    async fn history(&self, key: &ScoreFingerprint) -> Result<Vec<StoreEntry>, StoreError>;

    /// Stream of every mutation committed after this call. Never ends on
    /// its own; drop it to unsubscribe.
    fn watch_all(&self) -> Result<BoxStream<'static, StoreEntry>, StoreError>;
}

/// SQLite-backed score store (single connection with mutex).
///
/// Every put appends to `score_history`, whose rowid doubles as the
/// store-wide revision counter. Watchers tail that table, so writes made
/// by other processes sharing the file are observed as well.
#[derive(Clone)]
pub struct SqliteScoreStore {
    conn: Arc<Mutex<Connection>>,
    history_depth: u32,
    watch_poll: Duration,
}

impl SqliteScoreStore {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str, history_depth: u32, watch_poll: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        let store = SqliteScoreStore {
            conn: Arc::new(Mutex::new(conn)),
            history_depth: history_depth.max(1),
            watch_poll,
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    fn latest_revision(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let rev: i64 = conn.query_row(
            "SELECT COALESCE(MAX(revision), 0) FROM score_history",
            [],
            |r| r.get(0),
        )?;
        Ok(rev as u64)
    }

    fn entries_since(&self, revision: u64) -> Result<Vec<StoreEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, value, revision, recorded_at
             FROM score_history WHERE revision > ?1 ORDER BY revision ASC",
        )?;
        let rows = stmt
            .query_map(params![revision as i64], map_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn get(&self, key: &ScoreFingerprint) -> ScoreLookup {
        let conn = match self.lock() {
            Ok(c) => c,
            Err(e) => return ScoreLookup::Failed(e),
        };
        let row = conn
            .query_row(
                "SELECT value, revision FROM scores WHERE key = ?1",
                params![key.as_str()],
                |row| {
                    Ok(StoredScore {
                        score: row.get(0)?,
                        revision: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional();
        match row {
            Ok(Some(stored)) => ScoreLookup::Found(stored),
            Ok(None) => ScoreLookup::Absent,
            Err(e) => ScoreLookup::Failed(e.into()),
        }
    }

    async fn put(&self, key: &ScoreFingerprint, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let now = Utc::now();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO score_history (key, value, recorded_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), value, now],
        )?;
        let revision = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO scores (key, value, revision, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                revision=excluded.revision,
                updated_at=excluded.updated_at",
            params![key.as_str(), value, revision, now],
        )?;
        let pruned = tx.execute(
            "DELETE FROM score_history
             WHERE key = ?1 AND revision NOT IN (
                SELECT revision FROM score_history
                WHERE key = ?1 ORDER BY revision DESC LIMIT ?2
             )",
            params![key.as_str(), self.history_depth],
        )?;
        tx.commit()?;
        if pruned > 0 {
            debug!(key = %key, pruned, "Pruned score history");
        }
        Ok(revision as u64)
    }

    async fn entries(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, value, revision, updated_at FROM scores ORDER BY key ASC",
        )?;
        let rows = stmt
            .query_map([], map_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn history(&self, key: &ScoreFingerprint) -> Result<Vec<StoreEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, value, revision, recorded_at
             FROM score_history WHERE key = ?1 ORDER BY revision DESC",
        )?;
        let rows = stmt
            .query_map(params![key.as_str()], map_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn watch_all(&self) -> Result<BoxStream<'static, StoreEntry>, StoreError> {
        let cursor = self.latest_revision()?;
        let state = (self.clone(), cursor, VecDeque::new());
        let watch = stream::unfold(state, |(store, mut cursor, mut pending)| async move {
            loop {
                if let Some(entry) = pending.pop_front() {
                    return Some((entry, (store, cursor, pending)));
                }
                tokio::time::sleep(store.watch_poll).await;
                match store.entries_since(cursor) {
                    Ok(rows) => {
                        if let Some(last) = rows.last() {
                            cursor = last.revision;
                        }
                        pending.extend(rows);
                    }
                    Err(e) => warn!("Score store watch poll failed: {}", e),
                }
            }
        });
        Ok(watch.boxed())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_entry(row: &rusqlite::Row) -> rusqlite::Result<StoreEntry> {
    Ok(StoreEntry {
        key: ScoreFingerprint::from(row.get::<_, String>(0)?),
        value: row.get(1)?,
        revision: row.get::<_, i64>(2)? as u64,
        recorded_at: row.get(3)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS score_history (
    revision    INTEGER PRIMARY KEY AUTOINCREMENT,
    key         TEXT    NOT NULL,
    value       TEXT    NOT NULL,
    recorded_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS scores (
    key         TEXT    PRIMARY KEY,
    value       TEXT    NOT NULL,
    revision    INTEGER NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_score_history_key ON score_history(key, revision);
"#;
