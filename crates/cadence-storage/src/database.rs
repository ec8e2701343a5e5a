// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use cadence_config::model::StorageConfig;
use cadence_core::CadenceError;
use tracing::{debug, info};

use crate::migrations;

/// Handle to the single SQLite writer.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file, apply PRAGMAs and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CadenceError> {
        Self::open_with(path, true).await
    }

    /// Open from the `[storage]` config section.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CadenceError> {
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    async fn open_with(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, CadenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CadenceError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(map_open_err)?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path = %path.display(), wal_mode, "database opened");
        Ok(db)
    }

    /// Private in-memory database, used by tests and `check-config`.
    pub async fn open_in_memory() -> Result<Self, CadenceError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(map_open_err)?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), CadenceError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| Ok::<_, rusqlite::Error>(migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;
        debug!("migrations applied");
        Ok(())
    }

    /// The underlying async connection. Query modules call through this.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the background thread.
    pub async fn close(self) -> Result<(), CadenceError> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| CadenceError::Storage {
                source: e.to_string().into(),
            })
    }
}

/// Opening a connection fails with a plain rusqlite error, not a call error.
fn map_open_err(e: rusqlite::Error) -> CadenceError {
    CadenceError::Storage {
        source: Box::new(e),
    }
}

/// Bridge tokio-rusqlite errors into [`CadenceError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CadenceError {
    CadenceError::Storage {
        source: e.to_string().into(),
    }
}
