//! Ledger collaborators consumed by the relay core.
//!
//! The scanner only needs [SourceLedger]; the gate and submitter only need [DestinationLedger].
//! `crate::evm` binds both to EVM JSON-RPC; tests substitute in-memory doubles.

use crate::abi::{to_hex, EventKind};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("transaction not found: {}", to_hex(.0))]
    TransactionNotFound(B256),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("signing error: {0}")]
    Signing(String),
}

impl LedgerError {
    /// Failures that may clear up on their own (transport, reorg visibility, unmined tx).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Http(_)
                | LedgerError::BlockNotFound(_)
                | LedgerError::TransactionNotFound(_)
        )
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(e: anyhow::Error) -> Self {
        LedgerError::Decode(e.to_string())
    }
}

/// One source log as returned by the collaborator, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub recipient: Option<String>,
    pub amount: Option<U256>,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

/// An encoded contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Canonical function signature, for logs.
    pub function: &'static str,
    pub calldata: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub nonce: u64,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// RLP-encoded signed transaction, ready for eth_sendRawTransaction.
    pub raw: Vec<u8>,
    /// keccak256 of `raw`.
    pub hash: B256,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub status: u64,
    pub block_number: u64,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// Read side of the source chain.
#[async_trait]
pub trait SourceLedger: Send + Sync {
    /// Latest block number.
    async fn current_head(&self) -> LedgerResult<u64>;

    /// Logs of `kind` emitted by `contract` in `[from_block, to_block]` (inclusive).
    async fn query_events(
        &self,
        contract: Address,
        kind: &EventKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<RawEvent>>;
}

/// Destination chain: replay record, nonce, signing, broadcast and receipts.
#[async_trait]
pub trait DestinationLedger: Send + Sync {
    async fn current_head(&self) -> LedgerResult<u64>;

    /// Account that signs mint transactions.
    fn signer_address(&self) -> Address;

    async fn account_nonce(&self, address: Address) -> LedgerResult<u64>;

    /// Whether the destination bridge has already recorded `source_tx_hash`.
    async fn is_processed(&self, source_tx_hash: B256) -> LedgerResult<bool>;

    async fn build_and_sign(
        &self,
        call: &ContractCall,
        gas: &GasParams,
    ) -> LedgerResult<SignedTransaction>;

    async fn broadcast(&self, tx: &SignedTransaction) -> LedgerResult<B256>;

    /// Block until the receipt is available; bounded by the implementation's own timeout.
    async fn wait_for_receipt(&self, tx_hash: B256) -> LedgerResult<TxReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LedgerError::BlockNotFound("0x10".into()).is_transient());
        assert!(LedgerError::TransactionNotFound(B256::ZERO).is_transient());
        assert!(!LedgerError::Rpc {
            code: -32000,
            message: "insufficient funds".into()
        }
        .is_transient());
        assert!(!LedgerError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn receipt_status() {
        assert!(TxReceipt { status: 1, block_number: 9 }.succeeded());
        assert!(!TxReceipt { status: 0, block_number: 9 }.succeeded());
    }
}
