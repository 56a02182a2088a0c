// src/blockchain/ledger.rs
//! Ledger abstraction used by the anchoring client.

use crate::errors::LedgerError;
use async_trait::async_trait;

/// What the chain reported for one finalized write.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    pub transaction_hash: String,
    pub block_hash: String,
    /// True iff the receipt carries the success marker
    pub success: bool,
    pub gas_used: u64,
    /// Log lines of the transaction and its receipts, in emission order
    pub logs: Vec<String>,
    /// RFC 3339 block time, empty when unknown
    pub block_timestamp: String,
}

/// An append-only string registry on some chain.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address or account id of the registry contract.
    fn contract_id(&self) -> String;

    /// Appends `"<did1>-<hash>-<did2>"` and waits for finality.
    async fn add_record(&self, did1: &str, hash: &str, did2: &str) -> Result<LedgerReceipt, LedgerError>;

    /// The full registry, in append order.
    async fn records(&self) -> Result<Vec<String>, LedgerError>;
}
