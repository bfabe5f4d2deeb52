//! Submission gate: has the destination bridge already minted for this source transaction?

use crate::ledger::{DestinationLedger, LedgerResult};
use alloy::primitives::B256;
use std::sync::Arc;

/// Read-only idempotency check against the destination bridge. Not cached: a previous run may
/// have minted without leaving any local trace.
pub struct SubmissionGate {
    destination: Arc<dyn DestinationLedger>,
}

impl SubmissionGate {
    pub fn new(destination: Arc<dyn DestinationLedger>) -> Self {
        Self { destination }
    }

    pub async fn already_processed(&self, source_tx_hash: B256) -> LedgerResult<bool> {
        self.destination.is_processed(source_tx_hash).await
    }
}
