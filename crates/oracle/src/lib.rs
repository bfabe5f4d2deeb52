//! Off-chain bridge oracle: relays confirmed source-chain deposits as destination-chain mints.
//!
//! - **EventScanner**: plans the next confirmed block range from the persisted [ScanCursor]
//!   (via [plan]), fetches `AssetDeposited` logs and advances the cursor.
//! - **TransactionSubmitter**: checks the [SubmissionGate] (the destination bridge's own
//!   processed-transaction record), then signs, broadcasts and waits for a `mint`.
//! - **RelayLoop**: drives scan → submit → sleep until shutdown, backing off after a failed
//!   cycle.
//!
//! Ledger access goes through [SourceLedger] and [DestinationLedger]; [evm] binds them to
//! EVM JSON-RPC.

pub mod abi;
pub mod config;
pub mod cursor;
pub mod evm;
pub mod gate;
pub mod ledger;
pub mod planner;
pub mod relay;
pub mod rpc;
pub mod scanner;
pub mod signer;
pub mod submitter;

pub use abi::EventKind;
pub use config::{ConfigError, OracleConfig, SecretKey};
pub use cursor::{CursorError, CursorStore, FileCursorStore, MemoryCursorStore, ScanCursor};
pub use evm::{EvmDestinationLedger, EvmSourceLedger, ReceiptPolicy};
pub use gate::SubmissionGate;
pub use ledger::{
    ContractCall, DestinationLedger, GasParams, LedgerError, LedgerResult, RawEvent,
    SignedTransaction, SourceLedger, TxReceipt,
};
pub use planner::{plan, ScanRange};
pub use relay::{CursorCommit, CycleReport, RelayError, RelayLoop, RelaySettings};
pub use scanner::{EventScanner, RelayEvent, ScanBatch};
pub use signer::LocalSigner;
pub use submitter::{SubmissionOutcome, TransactionSubmitter};
