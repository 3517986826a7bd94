//! SQLite-backed storage medium
//!
//! Gives non-browser hosts (the CLI in particular) a medium that survives
//! between processes, so a `state` saved while preparing a login can be
//! resolved when the redirect response is handed back later.

use std::path::PathBuf;

use anyhow::Context;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{OidcWebError, Result};
use crate::storage::StorageMedium;

/// Environment variable overriding the default database location.
pub const STORAGE_DB_ENV: &str = "OIDC_WEB_STORAGE_DB";

/// Durable [`StorageMedium`] keeping items in a single SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory, unless
    /// `OIDC_WEB_STORAGE_DB` points somewhere else.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var(STORAGE_DB_ENV) {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("org", "oidc-web", "oidc-web")
            .ok_or_else(|| OidcWebError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| OidcWebError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("storage.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_web::storage::{SqliteStorage, StorageMedium};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("kv.db")).unwrap();
    /// storage.set_item("oidc.session", "{}").unwrap();
    /// assert_eq!(storage.get_item("oidc.session").unwrap().as_deref(), Some("{}"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| OidcWebError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Location of the database file.
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| OidcWebError::Storage(e.to_string()))?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| OidcWebError::Storage(e.to_string()))?;
        Ok(conn)
    }
}

impl StorageMedium for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;

        let value = conn
            .query_row(
                "SELECT value FROM items WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to read item")
            .map_err(|e| OidcWebError::Storage(e.to_string()))?;

        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "INSERT INTO items (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .context("Failed to write item")
        .map_err(|e| OidcWebError::Storage(e.to_string()))?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute("DELETE FROM items", [])
            .context("Failed to clear items")
            .map_err(|e| OidcWebError::Storage(e.to_string()))?;

        Ok(())
    }
}
