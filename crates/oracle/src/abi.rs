//! ABI types and encoding for the bridge contracts.
//!
//! `AssetDeposited` event on the source bridge; `processedTransactions(bytes32)` view and
//! `mint(address,uint256,bytes32)` on the destination bridge. Decode from JSON-RPC log shape.

use crate::ledger::{ContractCall, RawEvent};
use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde_json::Value;
use sha3::{Digest, Keccak256};

/// Destination mint entry point.
pub const MINT_SIGNATURE: &str = "mint(address,uint256,bytes32)";

/// Destination replay-protection view.
pub const PROCESSED_TRANSACTIONS_SIGNATURE: &str = "processedTransactions(bytes32)";

/// A source-chain event the oracle watches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKind {
    pub name: &'static str,
    pub signature: &'static str,
}

impl EventKind {
    /// `AssetDeposited(address indexed recipient, uint256 amount)`.
    pub const ASSET_DEPOSITED: EventKind = EventKind {
        name: "AssetDeposited",
        signature: "AssetDeposited(address,uint256)",
    };

    /// keccak256 of the canonical signature (log topic 0).
    pub fn topic0(&self) -> B256 {
        B256::from(keccak256(self.signature.as_bytes()))
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First 4 bytes of keccak256(signature).
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `0x`-prefixed lowercase hex, used for every hash and address in logs and RPC params.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl ContractCall {
    /// `mint(to, amount, sourceTxHash)`; the source hash lets the destination contract keep its
    /// own replay record.
    pub fn mint(to: Address, amount: U256, source_tx_hash: B256) -> Self {
        let mut calldata = Vec::with_capacity(4 + 32 * 3);
        calldata.extend_from_slice(&selector(MINT_SIGNATURE));
        calldata.extend_from_slice(&address_word(to));
        calldata.extend_from_slice(&amount.to_be_bytes::<32>());
        calldata.extend_from_slice(source_tx_hash.as_slice());
        Self {
            function: MINT_SIGNATURE,
            calldata,
        }
    }

    /// `processedTransactions(sourceTxHash)` view call.
    pub fn processed_transactions(source_tx_hash: B256) -> Self {
        let mut calldata = Vec::with_capacity(4 + 32);
        calldata.extend_from_slice(&selector(PROCESSED_TRANSACTIONS_SIGNATURE));
        calldata.extend_from_slice(source_tx_hash.as_slice());
        Self {
            function: PROCESSED_TRANSACTIONS_SIGNATURE,
            calldata,
        }
    }
}

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// True if the log's topic 0 equals `topic0`.
pub fn log_matches_topic(log: &Value, topic0: &B256) -> bool {
    let t0 = match log
        .get("topics")
        .and_then(|t| t.as_array())
        .and_then(|t| t.first())
        .and_then(|t| t.as_str())
    {
        Some(s) => s,
        None => return false,
    };
    matches!(parse_hex_bytes_32(t0), Ok(bytes) if bytes == *topic0)
}

/// Decode a JSON-RPC log (eth_getLogs result entry) into a [RawEvent].
///
/// Lenient: any field that is missing or unparsable is left as `None` so the scanner can decide
/// what to skip; one bad log never fails the batch.
pub fn decode_deposit_log(log_value: &Value) -> RawEvent {
    let field = |name: &str| log_value.get(name).and_then(|v| v.as_str());
    let topics = log_value.get("topics").and_then(|t| t.as_array());

    // recipient is indexed (topics[1]); log "address" is the bridge that emitted the event.
    let recipient = topics
        .and_then(|t| t.get(1))
        .and_then(|t| t.as_str())
        .and_then(|s| parse_hex_bytes_20(s).ok())
        .map(|bytes| Address::from(bytes).to_checksum(None));
    let amount = field("data")
        .and_then(|s| parse_hex_bytes(s).ok())
        .filter(|data| data.len() >= 32)
        .map(|data| U256::from_be_slice(&data[..32]));

    RawEvent {
        recipient,
        amount,
        transaction_hash: field("transactionHash").and_then(|s| parse_hex_bytes_32(s).ok()),
        block_number: field("blockNumber").and_then(|s| parse_hex_u64(s).ok()),
        log_index: field("logIndex").and_then(|s| parse_hex_u64(s).ok()),
    }
}

/// Decode a `bool` eth_call return (one ABI word).
pub fn decode_bool_return(data: &[u8]) -> Result<bool> {
    if data.len() < 32 {
        anyhow::bail!("bool return too short: {} bytes", data.len());
    }
    Ok(data[..32].iter().any(|b| *b != 0))
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).context("parse hex u64")
}

pub(crate) fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).context("parse hex bytes")
}

pub(crate) fn parse_hex_bytes_32(s: &str) -> Result<B256> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32 bytes, got {}", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_hex_bytes_20(s: &str) -> Result<[u8; 20]> {
    let bytes = parse_hex_bytes(s)?;
    let mut out = [0u8; 20];
    if bytes.len() == 20 {
        out.copy_from_slice(&bytes);
        Ok(out)
    } else if bytes.len() == 32 {
        // Indexed address in EVM is a left-padded 32-byte word; take last 20.
        out.copy_from_slice(&bytes[12..32]);
        Ok(out)
    } else {
        anyhow::bail!("Expected 20 or 32 bytes for address, got {}", bytes.len());
    }
}
