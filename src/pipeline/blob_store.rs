use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob store: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("project document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("creating store directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("no project with id {0}")]
    NotFound(String),
}

/// Local key/value storage in one SQLite file: raw audio bytes in `blobs`,
/// small text values (the project index) in `kv`.
pub struct BlobStore {
    conn: Connection,
}

impl BlobStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // the control thread and the store worker each hold a connection to the same file
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
                CREATE TABLE IF NOT EXISTS blobs (
                    key TEXT PRIMARY KEY,
                    data BLOB NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            ",
        )?;
        Ok(Self { conn })
    }

    pub fn put_blob(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO blobs (key, data) VALUES (?1, ?2)",
            params![key, data],
        )?;
        Ok(())
    }

    pub fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT data FROM blobs WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(data)
    }

    pub fn delete_blob(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }
}
