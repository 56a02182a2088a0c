// src/storage/database.rs
//! SQLite handle shared by the mirror store and the verified record store.

use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};
use rusqlite::Connection;

use super::schema;
use crate::errors::StorageError;

/// Single-connection SQLite database.
///
/// Writes are plain inserts, so serializing access through one connection is
/// enough; SQLite's own insert atomicity covers the rest.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens or creates the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_schema(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        debug!("Opening in-memory SQLite database");
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StorageError> {
        schema::init_schema(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }
}
