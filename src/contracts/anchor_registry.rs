// src/contracts/anchor_registry.rs
//! Anchoring registry smart contract bindings.
//!
//! The contract keeps an ordered, append-only `string[]`:
//! - `addRecord(did1, hash, did2)` appends `"<did1>-<hash>-<did2>"` and emits
//!   `RecordAdded(entry)`
//! - `getRecords()` returns the whole sequence, unfiltered

use ethers::prelude::abigen;

abigen!(
    AnchorRegistry,
    r#"[
        function addRecord(string did1, string hash, string did2)
        function getRecords() external view returns (string[])
        event RecordAdded(string entry)
    ]"#
);

/// Name of the write method, recorded on every mirrored transaction.
pub const ADD_RECORD_METHOD: &str = "addRecord";
