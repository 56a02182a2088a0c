// src/blockchain/anchoring.rs
//! Ledger anchoring client.
//!
//! Records `(partyA, contentHash, partyB)` on the registry, normalizes the
//! outcome and mirrors it into the local store. There is no retry and no
//! idempotency check: anchoring the same tuple twice produces two ledger
//! entries and two mirror rows.

use crate::blockchain::ledger::{Ledger, LedgerReceipt};
use crate::contracts::anchor_registry::ADD_RECORD_METHOD;
use crate::errors::AnchorError;
use crate::models::record::{RegistryEntry, TransactionRecord, TransactionStatus};
use crate::settings::LedgerSettings;
use crate::storage::database::Database;
use crate::storage::{timestamp_now, transactions};
use crate::utils::context::RequestContext;
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Normalized result of one ledger write.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub transaction_hash: String,
    pub block_hash: String,
    pub status: TransactionStatus,
    pub gas_burnt: u64,
    pub logs: Vec<String>,
    pub explorer_link: String,
    pub near_blocks_link: String,
    pub blockchain_timestamp: String,
}

/// Ledger writer plus mirror store.
pub struct AnchoringClient {
    ledger: Arc<dyn Ledger>,
    db: Arc<Database>,
    explorer_tx_url: String,
    secondary_explorer_tx_url: String,
}

impl AnchoringClient {
    pub fn new(ledger: Arc<dyn Ledger>, db: Arc<Database>, settings: &LedgerSettings) -> Self {
        AnchoringClient {
            ledger,
            db,
            explorer_tx_url: settings.explorer_tx_url.clone(),
            secondary_explorer_tx_url: settings.secondary_explorer_tx_url.clone(),
        }
    }

    /// The exact string the registry appends.
    pub fn entry_string(did1: &str, hash: &str, did2: &str) -> String {
        RegistryEntry::new(did1, hash, did2).encode()
    }

    /// Submits one write and normalizes the finalized outcome.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        did1: &str,
        hash: &str,
        did2: &str,
    ) -> Result<TransactionOutcome, AnchorError> {
        for (field, value) in [("did1", did1), ("hash", hash), ("did2", did2)] {
            if value.trim().is_empty() {
                return Err(AnchorError::Invalid(format!("{} is required", field)));
            }
        }
        info!(
            "anchor: {} - submitting {}",
            ctx.correlation_id,
            Self::entry_string(did1, hash, did2)
        );

        let receipt = self.ledger.add_record(did1, hash, did2).await.map_err(|e| {
            error!("anchor: {} - submission failed: {}", ctx.correlation_id, e);
            AnchorError::Ledger(e)
        })?;
        let outcome = self.outcome(receipt);
        if outcome.status == TransactionStatus::Failure {
            warn!(
                "anchor: {} - transaction {} finalized without success",
                ctx.correlation_id, outcome.transaction_hash
            );
        }
        Ok(outcome)
    }

    /// Submits and mirrors the outcome. Failed transactions are mirrored too,
    /// with status `FAILURE`.
    pub async fn anchor(
        &self,
        ctx: &RequestContext,
        did1: &str,
        hash: &str,
        did2: &str,
    ) -> Result<TransactionRecord, AnchorError> {
        let outcome = self.submit(ctx, did1, hash, did2).await?;
        let mut record = TransactionRecord {
            id: 0,
            transaction_hash: outcome.transaction_hash,
            block_hash: outcome.block_hash,
            did1: did1.to_string(),
            did2: did2.to_string(),
            data_hash: hash.to_string(),
            record_id: format!("{}-{}-{}", did1, did2, Uuid::new_v4()),
            contract_id: self.ledger.contract_id(),
            method_name: ADD_RECORD_METHOD.to_string(),
            status: outcome.status,
            gas_burnt: outcome.gas_burnt,
            logs: outcome.logs,
            explorer_link: outcome.explorer_link,
            near_blocks_link: outcome.near_blocks_link,
            created_at: timestamp_now(),
            blockchain_timestamp: outcome.blockchain_timestamp,
        };

        let id = self.db.with_conn(|c| transactions::insert(c, &record)).map_err(|e| {
            // the ledger entry exists even though the mirror write failed
            error!(
                "anchor: {} - mirror insert for {} failed: {}",
                ctx.correlation_id, record.transaction_hash, e
            );
            AnchorError::Storage(e)
        })?;
        record.id = id;
        info!(
            "anchor: {} - mirrored {} as {} ({})",
            ctx.correlation_id, record.transaction_hash, record.record_id, record.status
        );
        Ok(record)
    }

    /// The raw on-chain registry.
    pub async fn entries(&self) -> Result<Vec<String>, AnchorError> {
        Ok(self.ledger.records().await?)
    }

    fn outcome(&self, receipt: LedgerReceipt) -> TransactionOutcome {
        TransactionOutcome {
            explorer_link: self.explorer_tx_url.replace("{hash}", &receipt.transaction_hash),
            near_blocks_link: self.secondary_explorer_tx_url.replace("{hash}", &receipt.transaction_hash),
            status: if receipt.success {
                TransactionStatus::Success
            } else {
                TransactionStatus::Failure
            },
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            gas_burnt: receipt.gas_used,
            logs: receipt.logs,
            blockchain_timestamp: receipt.block_timestamp,
        }
    }
}
