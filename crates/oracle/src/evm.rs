//! EVM JSON-RPC bindings for the ledger traits.

use crate::abi::{
    decode_bool_return, decode_deposit_log, log_matches_topic, parse_hex_bytes,
    parse_hex_bytes_32, to_hex, EventKind,
};
use crate::ledger::{
    ContractCall, DestinationLedger, GasParams, LedgerError, LedgerResult, RawEvent,
    SignedTransaction, SourceLedger, TxReceipt,
};
use crate::rpc::{parse_quantity, quantity, JsonRpcClient};
use crate::signer::{LegacyTransaction, LocalSigner};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn build_logs_filter(address: &Address, topic0: &B256, from_block: u64, to_block: u64) -> Value {
    // Single-topic filter: [topic0] only (some nodes reject [topic0, null, null, null]).
    json!({
        "address": to_hex(address.as_slice()),
        "topics": [to_hex(topic0)],
        "fromBlock": quantity(from_block),
        "toBlock": quantity(to_block),
    })
}

fn is_removed(log: &Value) -> bool {
    log.get("removed").and_then(|r| r.as_bool()).unwrap_or(false)
}

/// Source chain over HTTP JSON-RPC.
pub struct EvmSourceLedger {
    rpc: JsonRpcClient,
}

impl EvmSourceLedger {
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url)?,
        })
    }

    pub async fn chain_id(&self) -> LedgerResult<u64> {
        self.rpc.request_quantity("eth_chainId", json!([])).await
    }
}

#[async_trait]
impl SourceLedger for EvmSourceLedger {
    async fn current_head(&self) -> LedgerResult<u64> {
        self.rpc.request_quantity("eth_blockNumber", json!([])).await
    }

    async fn query_events(
        &self,
        contract: Address,
        kind: &EventKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<RawEvent>> {
        let topic0 = kind.topic0();
        let filter = build_logs_filter(&contract, &topic0, from_block, to_block);
        let result = self.rpc.request("eth_getLogs", json!([filter])).await?;
        let logs = result
            .as_array()
            .ok_or_else(|| LedgerError::Decode("getLogs not array".into()))?;
        let events: Vec<RawEvent> = logs
            .iter()
            .filter(|log| !is_removed(log))
            // Some nodes ignore the topic filter; check it client-side as well.
            .filter(|log| log_matches_topic(log, &topic0))
            .map(decode_deposit_log)
            .collect();
        if events.len() != logs.len() {
            tracing::debug!(
                raw_count = logs.len(),
                kept = events.len(),
                from_block,
                to_block,
                "dropped removed or foreign logs"
            );
        }
        Ok(events)
    }
}

/// How long, and how often, to poll for a mint receipt.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Destination chain over HTTP JSON-RPC, signing locally with the oracle key.
pub struct EvmDestinationLedger {
    rpc: JsonRpcClient,
    contract: Address,
    signer: LocalSigner,
    chain_id: u64,
    receipts: ReceiptPolicy,
}

impl EvmDestinationLedger {
    /// Connect and read the chain id (used for EIP-155 signing).
    pub async fn connect(
        url: impl Into<String>,
        contract: Address,
        signer: LocalSigner,
        receipts: ReceiptPolicy,
    ) -> LedgerResult<Self> {
        let rpc = JsonRpcClient::new(url)?;
        let chain_id = rpc.request_quantity("eth_chainId", json!([])).await?;
        Ok(Self {
            rpc,
            contract,
            signer,
            chain_id,
            receipts,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn eth_call(&self, call: &ContractCall) -> LedgerResult<Vec<u8>> {
        let params = json!([{
            "to": to_hex(self.contract.as_slice()),
            "data": to_hex(&call.calldata),
        }, "latest"]);
        let result = self.rpc.request("eth_call", params).await?;
        let s = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("eth_call result not string".into()))?;
        Ok(parse_hex_bytes(s)?)
    }
}

#[async_trait]
impl DestinationLedger for EvmDestinationLedger {
    async fn current_head(&self) -> LedgerResult<u64> {
        self.rpc.request_quantity("eth_blockNumber", json!([])).await
    }

    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn account_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.rpc
            .request_quantity(
                "eth_getTransactionCount",
                json!([to_hex(address.as_slice()), "latest"]),
            )
            .await
    }

    async fn is_processed(&self, source_tx_hash: B256) -> LedgerResult<bool> {
        let data = self
            .eth_call(&ContractCall::processed_transactions(source_tx_hash))
            .await?;
        Ok(decode_bool_return(&data)?)
    }

    async fn build_and_sign(
        &self,
        call: &ContractCall,
        gas: &GasParams,
    ) -> LedgerResult<SignedTransaction> {
        let gas_price = self.rpc.request_quantity("eth_gasPrice", json!([])).await?;
        let tx = LegacyTransaction {
            nonce: gas.nonce,
            gas_price,
            gas_limit: gas.gas_limit,
            to: self.contract,
            value: 0,
            data: call.calldata.clone(),
            chain_id: self.chain_id,
        };
        tracing::debug!(
            function = call.function,
            nonce = gas.nonce,
            gas_price,
            "signing transaction"
        );
        self.signer.sign_legacy(&tx)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> LedgerResult<B256> {
        let result = self
            .rpc
            .request("eth_sendRawTransaction", json!([to_hex(&tx.raw)]))
            .await?;
        let s = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("tx hash not string".into()))?;
        Ok(parse_hex_bytes_32(s)?)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> LedgerResult<TxReceipt> {
        let deadline = receipt_deadline(Instant::now(), self.receipts.timeout);
        loop {
            let result = self
                .rpc
                .request("eth_getTransactionReceipt", json!([to_hex(tx_hash)]))
                .await?;
            if !result.is_null() {
                return decode_receipt(&result);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(LedgerError::TransactionNotFound(tx_hash));
            }
            sleep(self.receipts.poll_interval).await;
        }
    }
}

/// `None` when `timeout` reaches past what the clock can represent: wait without a deadline.
fn receipt_deadline(start: Instant, timeout: Duration) -> Option<Instant> {
    start.checked_add(timeout)
}

fn decode_receipt(receipt: &Value) -> LedgerResult<TxReceipt> {
    let field = |name: &str| {
        receipt
            .get(name)
            .ok_or_else(|| LedgerError::Decode(format!("receipt missing {name}")))
            .and_then(parse_quantity)
    };
    Ok(TxReceipt {
        status: field("status")?,
        block_number: field("blockNumber")?,
    })
}
