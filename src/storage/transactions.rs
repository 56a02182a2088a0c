// src/storage/transactions.rs
//! Mirror store for ledger transactions.
//!
//! A non-authoritative, queryable copy of submission outcomes. Rows are
//! append-only; the ledger itself stays the source of truth.

use rusqlite::{params, Connection, Row};
use serde_json::Value;

use crate::errors::StorageError;
use crate::models::record::{TransactionCriteria, TransactionRecord, TransactionStatus};

const SELECT_COLUMNS: &str = "SELECT id, transaction_hash, block_hash, did1, did2, data_hash, record_id, \
     contract_id, method_name, status, gas_burnt, logs, explorer_link, near_blocks_link, created_at, \
     blockchain_timestamp FROM raw_transactions";

/// Inserts a record and returns its assigned id. The `id` field of `record`
/// is ignored.
pub fn insert(conn: &Connection, record: &TransactionRecord) -> Result<i64, StorageError> {
    let logs = serde_json::to_string(&record.logs)?;
    conn.execute(
        "INSERT INTO raw_transactions (transaction_hash, block_hash, did1, did2, data_hash, record_id, \
         contract_id, method_name, status, gas_burnt, logs, explorer_link, near_blocks_link, created_at, \
         blockchain_timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            record.transaction_hash,
            record.block_hash,
            record.did1,
            record.did2,
            record.data_hash,
            record.record_id,
            record.contract_id,
            record.method_name,
            record.status.as_str(),
            record.gas_burnt as i64,
            logs,
            record.explorer_link,
            record.near_blocks_link,
            record.created_at,
            record.blockchain_timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Records matching every present criterion, newest first.
pub fn find(conn: &Connection, criteria: &TransactionCriteria) -> Result<Vec<TransactionRecord>, StorageError> {
    let mut sql = format!("{} WHERE 1=1", SELECT_COLUMNS);
    let mut params_vec: Vec<&dyn rusqlite::ToSql> = Vec::new();

    let filters = [
        ("record_id", &criteria.record_id),
        ("did1", &criteria.did1),
        ("did2", &criteria.did2),
        ("transaction_hash", &criteria.transaction_hash),
    ];
    for (column, value) in filters.iter() {
        if let Some(value) = value {
            sql.push_str(&format!(" AND {} = ?", column));
            params_vec.push(value);
        }
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_vec.as_slice(), read_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let status: String = row.get(9)?;
    let gas_burnt: i64 = row.get(10)?;
    let logs: String = row.get(11)?;
    Ok(TransactionRecord {
        id: row.get(0)?,
        transaction_hash: row.get(1)?,
        block_hash: row.get(2)?,
        did1: row.get(3)?,
        did2: row.get(4)?,
        data_hash: row.get(5)?,
        record_id: row.get(6)?,
        contract_id: row.get(7)?,
        method_name: row.get(8)?,
        status: TransactionStatus::parse(&status).unwrap_or(TransactionStatus::Failure),
        gas_burnt: gas_burnt.max(0) as u64,
        logs: parse_logs(&logs),
        explorer_link: row.get(12)?,
        near_blocks_link: row.get(13)?,
        created_at: row.get(14)?,
        blockchain_timestamp: row.get(15)?,
    })
}

/// Reads the stored log column without failing the row: non-string entries
/// are rendered as JSON text and unparsable content becomes a single entry.
pub fn parse_logs(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items.into_iter().map(log_line).collect(),
        Ok(Value::Null) => Vec::new(),
        Ok(other) => vec![log_line(other)],
        Err(_) if raw.trim().is_empty() => Vec::new(),
        Err(_) => vec![raw.to_string()],
    }
}

/// Coerces one log entry to a string.
pub fn log_line(value: Value) -> String {
    match value {
        Value::String(line) => line,
        other => other.to_string(),
    }
}
