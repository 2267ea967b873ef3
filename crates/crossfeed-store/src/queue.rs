//! Persistent post queue — durable, time-ordered, claim/complete dequeue.
//!
//! Rows are never mutated in place: rescheduling is complete + reinsert
//! under a fresh id. Dequeue claims rows as `inflight` instead of
//! deleting them, so a crash mid-post leaves the row recoverable.

use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;

use crossfeed_core::error::{RelayError, Result};
use crossfeed_core::types::{MediaItem, QueueEntry};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    media TEXT NOT NULL,
    caption TEXT NOT NULL,
    scheduled_at INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    state TEXT NOT NULL DEFAULT 'queued'
);
CREATE INDEX IF NOT EXISTS idx_queue_due ON queue(state, scheduled_at);";

pub struct PostQueue {
    conn: Mutex<Connection>,
}

impl PostQueue {
    /// Open (or create) the queue database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| RelayError::Store(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory queue for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| RelayError::Store(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RelayError::Store(e.to_string()))
    }

    /// Insert a pending post; returns its queue id.
    pub fn insert(
        &self,
        media: &[MediaItem],
        caption: &str,
        scheduled_at: i64,
        attempts: u32,
    ) -> Result<i64> {
        let media_json =
            serde_json::to_string(media).map_err(|e| RelayError::Store(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queue (media, caption, scheduled_at, attempts) VALUES (?1, ?2, ?3, ?4)",
            params![media_json, caption, scheduled_at, attempts],
        )
        .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Read-only preview of the next `n` pending entries, ascending by
    /// scheduled time. Does not mutate state.
    pub fn peek_next(&self, n: usize) -> Result<Vec<QueueEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, media, caption, scheduled_at, attempts FROM queue
                 WHERE state = 'queued'
                 ORDER BY scheduled_at ASC, id ASC LIMIT ?1",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(params![n as i64], row_to_entry)
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Atomically claim every entry with scheduled_at <= now: flips the
    /// rows to `inflight` and returns them ascending. A claimed entry is
    /// never returned by a later claim.
    pub fn claim_due(&self, now: i64) -> Result<Vec<QueueEntry>> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let entries = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, media, caption, scheduled_at, attempts FROM queue
                     WHERE state = 'queued' AND scheduled_at <= ?1
                     ORDER BY scheduled_at ASC, id ASC",
                )
                .map_err(|e| RelayError::Store(e.to_string()))?;
            let rows = stmt
                .query_map(params![now], row_to_entry)
                .map_err(|e| RelayError::Store(e.to_string()))?;
            rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
        };
        for entry in &entries {
            tx.execute(
                "UPDATE queue SET state = 'inflight' WHERE id = ?1",
                params![entry.id],
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        }
        tx.commit().map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(entries)
    }

    /// Delete an entry after a definitive outcome (posted, discarded,
    /// or replaced by a reinserted retry). No-op for unpersisted ids.
    pub fn complete(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.execute("DELETE FROM queue WHERE id = ?1", params![id])
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }

    /// Re-queue entries a crash left inflight. Returns how many.
    pub fn recover_inflight(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn
            .execute("UPDATE queue SET state = 'queued' WHERE state = 'inflight'", [])
            .map_err(|e| RelayError::Store(e.to_string()))?;
        if n > 0 {
            tracing::warn!("Recovered {n} inflight queue entries from a previous run");
        }
        Ok(n)
    }

    /// Delete all entries unconditionally, returning them so callers can
    /// release the media files they reference.
    pub fn clear(&self) -> Result<Vec<QueueEntry>> {
        let conn = self.lock()?;
        let entries = {
            let mut stmt = conn
                .prepare("SELECT id, media, caption, scheduled_at, attempts FROM queue")
                .map_err(|e| RelayError::Store(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_entry)
                .map_err(|e| RelayError::Store(e.to_string()))?;
            rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
        };
        conn.execute("DELETE FROM queue", [])
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(entries)
    }

    /// Number of pending (not inflight) entries.
    pub fn pending_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM queue WHERE state = 'queued'",
            [],
            |r| r.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(|e| RelayError::Store(e.to_string()))
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
    let media_json: String = row.get(1)?;
    Ok(QueueEntry {
        id: row.get(0)?,
        media: serde_json::from_str(&media_json).unwrap_or_default(),
        caption: row.get(2)?,
        scheduled_at: row.get(3)?,
        attempts: row.get(4)?,
    })
}
