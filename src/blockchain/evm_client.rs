// src/blockchain/evm_client.rs
//! EVM ledger client.
//!
//! Submits anchoring writes to the registry contract through a signing
//! middleware and normalizes the finalized receipt.

use crate::blockchain::ledger::{Ledger, LedgerReceipt};
use crate::contracts::anchor_registry::{AnchorRegistry, RecordAddedFilter};
use crate::errors::LedgerError;
use crate::settings::LedgerSettings;
use crate::utils::crypto::format_address;
use async_trait::async_trait;
use ethers::contract::parse_log;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockId, BlockNumber, Log, TransactionReceipt, U256, U64};
use ethers::utils::hex;
use log::{debug, info};
use std::sync::Arc;

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// EVM blockchain client bound to one anchoring registry.
///
/// This client provides:
/// - Wallet management with the configured private key
/// - Fixed-gas `addRecord` submission awaited to the configured confirmations
/// - Read access to the full registry
pub struct EvmLedger {
    /// Signing middleware shared by the contract binding
    client: Arc<Client>,
    /// Registry contract binding
    contract: AnchorRegistry<Client>,
    contract_address: Address,
    gas_limit: u64,
    confirmations: usize,
}

impl EvmLedger {
    /// Connects to the RPC endpoint and binds the registry contract.
    ///
    /// # Errors
    /// `Config` if the RPC URL, key or contract address is missing or invalid,
    /// `QueryFailed` if the chain id cannot be fetched.
    pub async fn connect(settings: &LedgerSettings) -> Result<Self, LedgerError> {
        let rpc_url = required(&settings.rpc_url, "ledger.rpc_url")?;
        let private_key = required(&settings.private_key, "ledger.private_key")?;
        let contract_address: Address = required(&settings.contract_address, "ledger.contract_address")?
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid contract address: {}", e)))?;

        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| LedgerError::Config(format!("Invalid RPC URL: {}", e)))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| LedgerError::QueryFailed(format!("eth_chainId failed: {}", e)))?
            .as_u64();
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| LedgerError::Config(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain_id);
        info!(
            "ledger: submitting from {} on chain {} to {}",
            format_address(&wallet.address()),
            chain_id,
            format_address(&contract_address)
        );

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = AnchorRegistry::new(contract_address, client.clone());
        Ok(EvmLedger {
            client,
            contract,
            contract_address,
            gas_limit: settings.gas_limit,
            confirmations: settings.confirmations,
        })
    }

    /// RFC 3339 timestamp of the receipt's block, empty when unavailable.
    async fn block_timestamp(&self, receipt: &TransactionReceipt) -> String {
        let Some(number) = receipt.block_number else {
            return String::new();
        };
        match self.client.get_block(BlockId::Number(BlockNumber::Number(number))).await {
            Ok(Some(block)) => rfc3339(block.timestamp),
            Ok(None) => String::new(),
            Err(e) => {
                debug!("ledger: block {} lookup failed: {}", number, e);
                String::new()
            }
        }
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, LedgerError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LedgerError::Config(format!("{} is not set", key)))
}

fn rfc3339(timestamp: U256) -> String {
    chrono::DateTime::from_timestamp(timestamp.low_u64() as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Renders one receipt log: decoded registry events as
/// `Added record: <entry>`, anything else as raw topics and data.
fn log_line(log: &Log) -> String {
    match parse_log::<RecordAddedFilter>(log.clone()) {
        Ok(event) => format!("Added record: {}", event.entry),
        Err(_) => format!(
            "{} topics=[{}] data=0x{}",
            format_address(&log.address),
            log.topics.iter().map(|t| format!("{:?}", t)).collect::<Vec<_>>().join(","),
            hex::encode(&log.data)
        ),
    }
}

/// Normalizes a finalized receipt. Success iff `status == 1`.
fn normalize(receipt: &TransactionReceipt, block_timestamp: String) -> LedgerReceipt {
    LedgerReceipt {
        transaction_hash: format!("{:?}", receipt.transaction_hash),
        block_hash: receipt.block_hash.map(|h| format!("{:?}", h)).unwrap_or_default(),
        success: receipt.status == Some(U64::from(1)),
        gas_used: receipt.gas_used.map(|g| g.low_u64()).unwrap_or(0),
        logs: receipt.logs.iter().map(log_line).collect(),
        block_timestamp,
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    fn contract_id(&self) -> String {
        format_address(&self.contract_address)
    }

    async fn add_record(&self, did1: &str, hash: &str, did2: &str) -> Result<LedgerReceipt, LedgerError> {
        let call = self
            .contract
            .add_record(did1.to_string(), hash.to_string(), did2.to_string())
            .gas(U256::from(self.gas_limit));
        let pending = call
            .send()
            .await
            .map_err(|e| LedgerError::SubmissionFailed(e.to_string()))?;
        let tx_hash = format!("{:?}", pending.tx_hash());
        debug!("ledger: submitted {}, awaiting {} confirmations", tx_hash, self.confirmations);

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|e| LedgerError::SubmissionFailed(format!("{}: {}", tx_hash, e)))?
            .ok_or_else(|| LedgerError::Dropped(tx_hash.clone()))?;

        let timestamp = self.block_timestamp(&receipt).await;
        Ok(normalize(&receipt, timestamp))
    }

    async fn records(&self) -> Result<Vec<String>, LedgerError> {
        self.contract
            .get_records()
            .call()
            .await
            .map_err(|e| LedgerError::QueryFailed(e.to_string()))
    }
}
