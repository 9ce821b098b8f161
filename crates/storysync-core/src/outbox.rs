//! Durable queue of stories awaiting replay.
//!
//! Backed by a single SQLite table. Ids come from `AUTOINCREMENT`, so an id
//! is never handed out twice even after the row holding it is deleted.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{NewStory, OutboxItem, PhotoBlob};

const OUTBOX_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL DEFAULT '',
    lat REAL,
    lon REAL,
    photo_data_url TEXT,
    photo_name TEXT,
    photo_type TEXT,
    token TEXT,
    queued_at TEXT NOT NULL
);
"#;

pub struct OutboxStore {
    conn: Mutex<Connection>,
}

impl OutboxStore {
    /// Open or create the outbox database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(OUTBOX_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Queue a story. Returns the id assigned to it once the insert commits.
    pub fn add(&self, story: &NewStory) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let photo = story.photo_blob.as_ref();
        conn.execute(
            "INSERT INTO outbox (description, lat, lon, photo_data_url, photo_name, photo_type, token, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                story.description,
                story.lat,
                story.lon,
                photo.map(|p| p.data_url.as_str()),
                photo.and_then(|p| p.name.as_deref()),
                photo.and_then(|p| p.content_type.as_deref()),
                story.token,
                Utc::now(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, "Queued story in outbox");
        Ok(id)
    }

    /// Every queued item, oldest first.
    pub fn list_all(&self) -> Result<Vec<OutboxItem>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, description, lat, lon, photo_data_url, photo_name, photo_type, token, queued_at
             FROM outbox ORDER BY id",
        )?;
        let items = stmt
            .query_map([], Self::item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Remove an item. Removing an id that is already gone is a no-op.
    pub fn remove(&self, id: i64) -> Result<(), StoreError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
        debug!(id, removed, "Removed outbox item");
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<OutboxItem> {
        let data_url: Option<String> = row.get(4)?;
        let photo_blob = data_url.map(|data_url| -> rusqlite::Result<PhotoBlob> {
            Ok(PhotoBlob {
                data_url,
                name: row.get(5)?,
                content_type: row.get(6)?,
            })
        });
        let queued_at: DateTime<Utc> = row.get(8)?;

        Ok(OutboxItem {
            id: row.get(0)?,
            story: NewStory {
                description: row.get(1)?,
                lat: row.get(2)?,
                lon: row.get(3)?,
                photo_blob: photo_blob.transpose()?,
                token: row.get(7)?,
            },
            queued_at,
        })
    }
}
