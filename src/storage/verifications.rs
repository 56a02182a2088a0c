// src/storage/verifications.rs
//! Store for verified presentations (`verify` table).

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::errors::StorageError;
use crate::models::record::{NewVerifiedRecord, VerifiedRecord};

/// Persists a verified presentation. Created once, never updated.
pub fn create(conn: &Connection, input: NewVerifiedRecord, now: &str) -> Result<VerifiedRecord, StorageError> {
    let record = VerifiedRecord {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email,
        did: input.did,
        vp_hash: input.vp_hash,
        verified: input.verified,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    };
    conn.execute(
        "INSERT INTO verify (id, name, email, did, vp_hash, verified, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            record.name,
            record.email,
            record.did,
            record.vp_hash,
            record.verified,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(record)
}

/// The `limit` most recently updated records.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<VerifiedRecord>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, did, vp_hash, verified, created_at, updated_at FROM verify \
         ORDER BY updated_at DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], read_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<VerifiedRecord> {
    Ok(VerifiedRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        did: row.get(3)?,
        vp_hash: row.get(4)?,
        verified: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
