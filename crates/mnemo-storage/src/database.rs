// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the `Database` struct IS the single writer. Query modules accept
//! `&Database` and call through `database.connection().call()`. Do NOT create
//! additional Connection instances for writes.

use std::path::Path;

use mnemo_core::MnemoError;
use tokio_rusqlite::Connection;

use crate::migrations;

/// Convert a tokio-rusqlite error into the storage error variant.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> MnemoError {
    MnemoError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection for the memory subsystem.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and bring the
    /// schema up to date.
    ///
    /// Sets WAL journaling and NORMAL synchronous mode for write throughput,
    /// then runs all pending refinery migrations.
    pub async fn open(path: &Path) -> Result<Self, MnemoError> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(MnemoError::storage)?;
        }

        tracing::debug!(path = %path.display(), "opening memory database");
        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::from(e)))?;
        Self::init(conn).await
    }

    /// Open an in-memory database with the full schema applied. Test use.
    pub async fn open_in_memory() -> Result<Self, MnemoError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::from(e)))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, MnemoError> {
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(MnemoError::storage)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(MnemoError::storage)?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .map_err(MnemoError::storage)?;
            migrations::run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(|e: tokio_rusqlite::Error<MnemoError>| MnemoError::Storage {
            source: Box::new(e),
        })?;

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.sqlite");
        let db = Database::open(&path).await.unwrap();

        // All five tables from the migrations must exist.
        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(names)
            })
            .await
            .unwrap();

        for expected in [
            "conversations",
            "messages",
            "facts",
            "fact_occurrences",
            "extraction_log",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.sqlite");
        drop(Database::open(&path).await.unwrap());
        // Migrations must not re-run or fail on a second open.
        Database::open(&path).await.unwrap();
    }
}
