use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Collection key for the activity log.
pub const ACTIVITIES_KEY: &str = "crmActivities";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("local store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent key-value store holding one JSON array per collection key.
///
/// Each read or write covers the whole collection under its key; the
/// connection mutex keeps a single read or write atomic against re-entrant
/// callers, but a read-modify-write sequence is not (last writer wins).
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// In-memory store, used by tests and as a last resort when no data
    /// directory is available.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the collection stored under `key`. A missing key or a value that
    /// no longer parses yields an empty collection, never an error: corrupt
    /// local data must not take the sync layer down.
    pub fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM collections WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("collection {} is unreadable, treating as empty: {}", key, e);
                Ok(Vec::new())
            }
        }
    }

    /// Replace the collection stored under `key` with `items`.
    pub fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string(items)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO collections (key, value) VALUES (?1, ?2)",
            params![key, json],
        )?;
        Ok(())
    }

    pub fn delete_collection(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM collections WHERE key = ?1", params![key])?;
        Ok(())
    }
}
