//! Common helpers for integration tests: in-memory ledgers and Anvil helpers.
//! Some helpers are only used by specific test binaries; allow dead_code to avoid per-binary warnings.
#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use bridge_oracle::abi::keccak256;
use bridge_oracle::rpc::JsonRpcClient;
use bridge_oracle::{
    ContractCall, CursorError, CursorStore, DestinationLedger, EventKind, GasParams, LedgerError,
    LedgerResult, RawEvent, SignedTransaction, SourceLedger, TxReceipt,
};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const RECIPIENT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("bridge_oracle=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

pub fn contract() -> Address {
    "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap()
}

/// A well-formed deposit log at `block`, keyed by `tag` (repeated into the tx hash).
pub fn deposit(block: u64, tag: u8) -> RawEvent {
    RawEvent {
        recipient: Some(RECIPIENT.to_string()),
        amount: Some(U256::from(1_000u64)),
        transaction_hash: Some(B256::repeat_byte(tag)),
        block_number: Some(block),
        log_index: Some(0),
    }
}

/// Source chain double. Returns stored logs for the queried range, like a node would.
#[derive(Default)]
pub struct MockSource {
    head: AtomicU64,
    events: Mutex<Vec<RawEvent>>,
    /// Errors returned by the next event queries, one per call.
    query_errors: Mutex<VecDeque<LedgerError>>,
    /// Ignore the requested range and return everything (misbehaving node).
    unfiltered: bool,
    queries: Mutex<Vec<(u64, u64)>>,
}

impl MockSource {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            ..Default::default()
        }
    }

    pub fn unfiltered(head: u64) -> Self {
        Self {
            unfiltered: true,
            ..Self::new(head)
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push(&self, event: RawEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn fail_next_query(&self, err: LedgerError) {
        self.query_errors.lock().unwrap().push_back(err);
    }

    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceLedger for MockSource {
    async fn current_head(&self) -> LedgerResult<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn query_events(
        &self,
        _contract: Address,
        _kind: &EventKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<RawEvent>> {
        self.queries.lock().unwrap().push((from_block, to_block));
        if let Some(err) = self.query_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| {
                self.unfiltered
                    || e.block_number
                        .map_or(true, |b| b >= from_block && b <= to_block)
            })
            .cloned()
            .collect())
    }
}

/// Destination chain double. Records every call; a successful mint marks the source hash
/// processed, as the bridge contract would.
pub struct MockDestination {
    signer: Address,
    processed: Mutex<HashSet<B256>>,
    nonce: AtomicU64,
    receipt_status: AtomicU64,
    fixed_tx_hash: Mutex<Option<B256>>,
    gate_errors: Mutex<VecDeque<LedgerError>>,
    broadcast_errors: Mutex<VecDeque<LedgerError>>,
    receipt_errors: Mutex<VecDeque<LedgerError>>,
    signed: Mutex<Vec<(ContractCall, GasParams)>>,
    broadcasts: Mutex<Vec<SignedTransaction>>,
    gate_queries: AtomicUsize,
    nonce_queries: AtomicUsize,
}

impl MockDestination {
    pub fn new() -> Self {
        Self {
            signer: RECIPIENT.parse().unwrap(),
            processed: Mutex::new(HashSet::new()),
            nonce: AtomicU64::new(0),
            receipt_status: AtomicU64::new(1),
            fixed_tx_hash: Mutex::new(None),
            gate_errors: Mutex::new(VecDeque::new()),
            broadcast_errors: Mutex::new(VecDeque::new()),
            receipt_errors: Mutex::new(VecDeque::new()),
            signed: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            gate_queries: AtomicUsize::new(0),
            nonce_queries: AtomicUsize::new(0),
        }
    }

    pub fn mark_processed(&self, source_tx_hash: B256) {
        self.processed.lock().unwrap().insert(source_tx_hash);
    }

    pub fn is_marked(&self, source_tx_hash: &B256) -> bool {
        self.processed.lock().unwrap().contains(source_tx_hash)
    }

    pub fn set_receipt_status(&self, status: u64) {
        self.receipt_status.store(status, Ordering::SeqCst);
    }

    pub fn set_tx_hash(&self, hash: B256) {
        *self.fixed_tx_hash.lock().unwrap() = Some(hash);
    }

    pub fn fail_next_gate(&self, err: LedgerError) {
        self.gate_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_next_broadcast(&self, err: LedgerError) {
        self.broadcast_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_next_receipt(&self, err: LedgerError) {
        self.receipt_errors.lock().unwrap().push_back(err);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    pub fn signed_calls(&self) -> Vec<(ContractCall, GasParams)> {
        self.signed.lock().unwrap().clone()
    }

    pub fn gate_queries(&self) -> usize {
        self.gate_queries.load(Ordering::SeqCst)
    }

    pub fn nonce_queries(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
    }

    /// Source hash embedded in mint calldata (last 32 bytes).
    fn source_hash_of(raw: &[u8]) -> B256 {
        B256::from_slice(&raw[raw.len() - 32..])
    }
}

#[async_trait]
impl DestinationLedger for MockDestination {
    async fn current_head(&self) -> LedgerResult<u64> {
        Ok(1)
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn account_nonce(&self, address: Address) -> LedgerResult<u64> {
        assert_eq!(address, self.signer);
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn is_processed(&self, source_tx_hash: B256) -> LedgerResult<bool> {
        self.gate_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.gate_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.is_marked(&source_tx_hash))
    }

    async fn build_and_sign(
        &self,
        call: &ContractCall,
        gas: &GasParams,
    ) -> LedgerResult<SignedTransaction> {
        self.signed.lock().unwrap().push((call.clone(), *gas));
        // "Raw" tx for the double is just the calldata; enough to recover the source hash.
        let raw = call.calldata.clone();
        Ok(SignedTransaction {
            hash: B256::from(keccak256(&raw)),
            raw,
            nonce: gas.nonce,
        })
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> LedgerResult<B256> {
        if let Some(err) = self.broadcast_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.broadcasts.lock().unwrap().push(tx.clone());
        self.nonce.fetch_add(1, Ordering::SeqCst);
        let hash = self.fixed_tx_hash.lock().unwrap().unwrap_or(tx.hash);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> LedgerResult<TxReceipt> {
        if let Some(err) = self.receipt_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let status = self.receipt_status.load(Ordering::SeqCst);
        if status == 1 {
            let last = self.broadcasts.lock().unwrap().last().cloned();
            if let Some(tx) = last {
                self.mark_processed(Self::source_hash_of(&tx.raw));
            }
        }
        let _ = tx_hash;
        Ok(TxReceipt {
            status,
            block_number: 7,
        })
    }
}

/// Cursor store whose saves always fail; loads return the initial value.
pub struct FailingCursorStore {
    pub initial: Option<i64>,
}

impl CursorStore for FailingCursorStore {
    fn load(&self) -> Option<i64> {
        self.initial
    }

    fn save(&self, _last_scanned_block: i64) -> Result<(), CursorError> {
        Err(CursorError::Io {
            path: "/read-only/cursor.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// True if `anvil` is in PATH (Foundry toolchain available).
/// Use at the start of integration tests to skip when not in CI/local dev with Foundry.
pub fn anvil_available() -> bool {
    Command::new("anvil")
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Start anvil on a free local port and wait until it answers. Caller kills the child.
pub async fn spawn_anvil() -> anyhow::Result<(Child, String)> {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let rpc_url = format!("http://127.0.0.1:{}", port);
    let mut child = Command::new("anvil")
        .arg("--port")
        .arg(port.to_string())
        .arg("--host")
        .arg("127.0.0.1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let rpc = JsonRpcClient::new(rpc_url.clone())?;
    for _ in 0..30 {
        if rpc.request("eth_blockNumber", json!([])).await.is_ok() {
            return Ok((child, rpc_url));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let _ = child.kill();
    anyhow::bail!("anvil RPC not ready at {}", rpc_url);
}
