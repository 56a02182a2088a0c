//! SQLite persistence.
//!
//! ## Tables
//!
//! - `raw_transactions` - mirror of ledger submissions
//! - `verify` - verified presentations
//! - `schema_version` - migration bookkeeping

pub mod database;
pub mod schema;
pub mod transactions;
pub mod verifications;

/// Timestamp format used for every stored `*_at` column.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
