//! Database schema definitions

use log::info;
use rusqlite::Connection;

use crate::errors::StorageError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Mirror of submitted ledger transactions. Rows are never updated.
const TRANSACTIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS raw_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_hash TEXT NOT NULL UNIQUE,
    block_hash TEXT NOT NULL,
    did1 TEXT NOT NULL,
    did2 TEXT NOT NULL,
    data_hash TEXT NOT NULL,
    record_id TEXT NOT NULL UNIQUE,
    contract_id TEXT NOT NULL,
    method_name TEXT NOT NULL,
    status TEXT NOT NULL,
    gas_burnt INTEGER NOT NULL DEFAULT 0,
    logs TEXT NOT NULL DEFAULT '[]',
    explorer_link TEXT NOT NULL,
    near_blocks_link TEXT NOT NULL,
    created_at TEXT NOT NULL,
    blockchain_timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raw_transactions_did1 ON raw_transactions(did1);
CREATE INDEX IF NOT EXISTS idx_raw_transactions_did2 ON raw_transactions(did2);
CREATE INDEX IF NOT EXISTS idx_raw_transactions_created ON raw_transactions(created_at);
"#;

/// Verified presentations.
const VERIFY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS verify (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    did TEXT NOT NULL,
    vp_hash TEXT NOT NULL,
    verified INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_verify_updated ON verify(updated_at);
"#;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(TRANSACTIONS_SCHEMA)?;
        conn.execute_batch(VERIFY_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Current schema version, 0 for a fresh database
fn get_schema_version(conn: &Connection) -> Result<i32, StorageError> {
    conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StorageError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('raw_transactions', 'verify')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
