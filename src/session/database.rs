// SQLite recording library

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{RecordingStore, RecordingSummary};
use crate::error::StoreError;
use crate::recording::Timeline;

/// Recording library backed by SQLite
///
/// Wraps Connection in a parking_lot::Mutex since rusqlite::Connection is not Sync.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the library at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;

        log::debug!("Opened recording library at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory library (fallback when the file cannot be opened)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;

        log::warn!("Using in-memory recording library - recordings will not persist across restarts");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                duration_ms REAL NOT NULL,
                event_count INTEGER NOT NULL,
                has_content INTEGER NOT NULL DEFAULT 0,
                events TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recordings_created ON recordings(created_at);
            "#,
        )?;
        Ok(())
    }

    fn map_summary_row(row: &rusqlite::Row) -> rusqlite::Result<RecordingSummary> {
        let created: String = row.get(1)?;
        let updated: String = row.get(2)?;
        let event_count: i64 = row.get(4)?;

        Ok(RecordingSummary {
            name: row.get(0)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
            duration_ms: row.get(3)?,
            event_count: event_count.max(0) as usize,
            has_content: row.get(5)?,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("Failed to parse timestamp '{}': {}, using current time", value, e);
            Utc::now()
        })
}

impl RecordingStore for SqliteStore {
    fn list(&self) -> Result<Vec<RecordingSummary>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, created_at, updated_at, duration_ms, event_count, has_content
             FROM recordings ORDER BY created_at, rowid",
        )?;

        let mut summaries = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            summaries.push(Self::map_summary_row(row)?);
        }
        Ok(summaries)
    }

    fn load(&self, name: &str) -> Result<Option<Timeline>, StoreError> {
        let conn = self.conn.lock();
        let events: Option<String> = conn
            .query_row("SELECT events FROM recordings WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;

        match events {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, name: &str, timeline: &Timeline) -> Result<(), StoreError> {
        let events = serde_json::to_string(timeline)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO recordings (name, created_at, updated_at, duration_ms, event_count, has_content, events)
            VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(name) DO UPDATE SET
                updated_at = excluded.updated_at,
                duration_ms = excluded.duration_ms,
                event_count = excluded.event_count,
                has_content = excluded.has_content,
                events = excluded.events
            "#,
            params![
                name,
                now,
                timeline.duration_ms(),
                timeline.len() as i64,
                timeline.has_content(),
                events,
            ],
        )?;
        Ok(())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        if old_name == new_name {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let target_exists: bool = tx
            .query_row("SELECT 1 FROM recordings WHERE name = ?1", params![new_name], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if target_exists {
            return Err(StoreError::NameConflict(new_name.to_string()));
        }

        let updated = tx.execute(
            "UPDATE recordings SET name = ?1, updated_at = ?2 WHERE name = ?3",
            params![new_name, Utc::now().to_rfc3339(), old_name],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(old_name.to_string()));
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM recordings WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}
