//! Transaction submitter: turn one confirmed deposit into a destination mint.

use crate::abi::to_hex;
use crate::gate::SubmissionGate;
use crate::ledger::{ContractCall, DestinationLedger, GasParams, LedgerError};
use crate::scanner::RelayEvent;
use alloy::primitives::{Address, B256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Mint mined with status 1.
    Submitted(B256),
    /// Destination bridge already recorded the source transaction; nothing sent.
    AlreadyProcessed,
    /// Not retried: malformed event, refused at broadcast, or reverted on chain.
    Rejected(String),
    /// Outcome unknown (gate/nonce query failed, transport failure while signing or
    /// broadcasting, receipt not found in time).
    TransientFailure(String),
}

impl SubmissionOutcome {
    /// False only for [SubmissionOutcome::TransientFailure].
    pub fn is_settled(&self) -> bool {
        !matches!(self, SubmissionOutcome::TransientFailure(_))
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Submitted(hash) => write!(f, "submitted {}", to_hex(hash)),
            SubmissionOutcome::AlreadyProcessed => f.write_str("already processed"),
            SubmissionOutcome::Rejected(reason) => write!(f, "rejected: {reason}"),
            SubmissionOutcome::TransientFailure(reason) => write!(f, "transient failure: {reason}"),
        }
    }
}

impl RelayEvent {
    /// Validate and encode the mint for this event.
    pub fn mint_call(&self) -> Result<ContractCall, &'static str> {
        let recipient =
            Address::from_str(self.recipient.trim()).map_err(|_| "recipient is not an address")?;
        if recipient.is_zero() {
            return Err("recipient is the zero address");
        }
        if self.amount.is_zero() {
            return Err("amount is zero");
        }
        if self.source_tx_hash.is_zero() {
            return Err("source transaction hash is zero");
        }
        Ok(ContractCall::mint(recipient, self.amount, self.source_tx_hash))
    }
}

pub struct TransactionSubmitter {
    destination: Arc<dyn DestinationLedger>,
    gate: SubmissionGate,
    gas_limit: u64,
}

impl TransactionSubmitter {
    pub fn new(destination: Arc<dyn DestinationLedger>, gas_limit: u64) -> Self {
        Self {
            gate: SubmissionGate::new(Arc::clone(&destination)),
            destination,
            gas_limit,
        }
    }

    /// Submit a mint for `event`. The gate is consulted on every attempt, including retries,
    /// and the nonce is re-read every time.
    pub async fn submit(&self, event: &RelayEvent) -> SubmissionOutcome {
        let source_tx = to_hex(event.source_tx_hash);
        let call = match event.mint_call() {
            Ok(c) => c,
            Err(reason) => {
                tracing::warn!(
                    %source_tx,
                    recipient = %event.recipient,
                    reason,
                    "malformed event, not submitting"
                );
                return SubmissionOutcome::Rejected("malformed".into());
            }
        };
        tracing::info!(
            %source_tx,
            recipient = %event.recipient,
            amount = %event.amount,
            block = event.source_block,
            "processing deposit"
        );

        match self.gate.already_processed(event.source_tx_hash).await {
            Ok(true) => {
                tracing::warn!(%source_tx, "already processed on destination, skipping");
                return SubmissionOutcome::AlreadyProcessed;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(%source_tx, reason = %e, "processed-record query failed");
                return SubmissionOutcome::TransientFailure(format!("gate query failed: {e}"));
            }
        }

        let account = self.destination.signer_address();
        let nonce = match self.destination.account_nonce(account).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    %source_tx,
                    account = %to_hex(account.as_slice()),
                    reason = %e,
                    "nonce query failed"
                );
                return SubmissionOutcome::TransientFailure(format!("nonce query failed: {e}"));
            }
        };
        let gas = GasParams {
            nonce,
            gas_limit: self.gas_limit,
        };

        let signed = match self.destination.build_and_sign(&call, &gas).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(
                    %source_tx,
                    function = call.function,
                    transient = e.is_transient(),
                    reason = %e,
                    "building transaction failed"
                );
                return classify(e);
            }
        };
        let tx_hash = match self.destination.broadcast(&signed).await {
            Ok(h) => h,
            Err(e) => {
                tracing::error!(
                    %source_tx,
                    nonce,
                    transient = e.is_transient(),
                    reason = %e,
                    "broadcast failed"
                );
                return classify(e);
            }
        };
        let tx_hash_hex = to_hex(tx_hash);
        tracing::info!(%source_tx, tx_hash = %tx_hash_hex, nonce, "submitted mint transaction");

        match self.destination.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.succeeded() => {
                tracing::info!(
                    %source_tx,
                    tx_hash = %tx_hash_hex,
                    block = receipt.block_number,
                    "mint succeeded"
                );
                SubmissionOutcome::Submitted(tx_hash)
            }
            Ok(receipt) => {
                tracing::error!(
                    %source_tx,
                    tx_hash = %tx_hash_hex,
                    status = receipt.status,
                    block = receipt.block_number,
                    "mint transaction failed"
                );
                SubmissionOutcome::Rejected("tx-failed".into())
            }
            Err(e) => {
                // The transaction was accepted; whether it lands is unknown either way.
                tracing::error!(
                    %source_tx,
                    tx_hash = %tx_hash_hex,
                    reason = %e,
                    "receipt unavailable, transaction may have been dropped"
                );
                SubmissionOutcome::TransientFailure(e.to_string())
            }
        }
    }
}

/// Signing and broadcast errors: transport-level failures leave the outcome unknown, anything
/// else is a refusal.
fn classify(e: LedgerError) -> SubmissionOutcome {
    if e.is_transient() {
        SubmissionOutcome::TransientFailure(e.to_string())
    } else {
        SubmissionOutcome::Rejected(e.to_string())
    }
}
