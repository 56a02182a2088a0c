pub mod anchoring;
pub mod evm_client;
pub mod ledger;
