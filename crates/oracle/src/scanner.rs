//! Event scanner: fetch confirmed deposit events for the next range and advance the cursor.
//!
//! Errors from the source ledger never escape a scan: the range is left unscanned and the
//! next cycle retries it. Only a cursor persistence failure is returned to the caller.

use crate::abi::{to_hex, EventKind};
use crate::cursor::{CursorError, CursorStore, ScanCursor};
use crate::ledger::{LedgerError, RawEvent, SourceLedger};
use crate::planner::{plan, ScanRange};
use crate::relay::RelayError;
use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;

/// One normalized deposit, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub recipient: String,
    pub amount: U256,
    /// Idempotency key on the destination chain.
    pub source_tx_hash: B256,
    pub source_block: u64,
    pub log_index: u64,
}

impl RelayEvent {
    /// Normalize a raw log; `Err` names the first missing field.
    pub fn from_raw(raw: RawEvent) -> Result<Self, &'static str> {
        Ok(Self {
            recipient: raw.recipient.ok_or("recipient")?,
            amount: raw.amount.ok_or("amount")?,
            source_tx_hash: raw.transaction_hash.ok_or("transactionHash")?,
            source_block: raw.block_number.ok_or("blockNumber")?,
            log_index: raw.log_index.unwrap_or_default(),
        })
    }
}

/// Events found in one planned range, not yet committed to the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBatch {
    pub range: ScanRange,
    pub events: Vec<RelayEvent>,
}

pub struct EventScanner {
    source: Arc<dyn SourceLedger>,
    store: Box<dyn CursorStore>,
    contract: Address,
}

impl EventScanner {
    pub fn new(
        source: Arc<dyn SourceLedger>,
        store: Box<dyn CursorStore>,
        contract: Address,
    ) -> Self {
        Self {
            source,
            store,
            contract,
        }
    }

    /// Scan the next confirmed range and advance the cursor to its end before returning.
    ///
    /// Once this returns, the range is never rescanned: an event that is not submitted
    /// afterwards (crash, transient failure) is not retried.
    pub async fn scan(
        &self,
        kind: &EventKind,
        required_confirmations: u64,
    ) -> Result<Vec<RelayEvent>, RelayError> {
        match self.scan_pending(kind, required_confirmations).await? {
            Some(batch) => {
                self.commit(batch.range)?;
                Ok(batch.events)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Scan the next confirmed range without touching the cursor.
    ///
    /// `Ok(None)` means nothing to commit: no new confirmed blocks, or the source failed and the
    /// range stays pending.
    pub async fn scan_pending(
        &self,
        kind: &EventKind,
        required_confirmations: u64,
    ) -> Result<Option<ScanBatch>, RelayError> {
        let head = match self.source.current_head().await {
            Ok(h) => h,
            Err(e) => {
                log_source_failure(&e, "reading source head");
                return Ok(None);
            }
        };
        let cursor = self.load_or_seed(head)?;
        let range = plan(cursor, head, required_confirmations);
        let Some((from, to)) = range.bounds() else {
            tracing::info!(
                head,
                last_scanned = cursor.last_scanned_block,
                "no new confirmed blocks to scan"
            );
            return Ok(None);
        };

        tracing::info!(event = kind.name, from, to, "scanning for events");
        let raw = match self.source.query_events(self.contract, kind, from, to).await {
            Ok(r) => r,
            Err(e) => {
                log_source_failure(&e, "querying events");
                return Ok(None);
            }
        };

        let mut events = normalize(raw, &range);
        events.sort_by_key(|e| (e.source_block, e.log_index));
        if !events.is_empty() {
            tracing::info!(count = events.len(), event = kind.name, from, to, "found new events");
        }
        Ok(Some(ScanBatch { range, events }))
    }

    /// Advance the cursor to the end of `range`. Never moves it backwards.
    pub fn commit(&self, range: ScanRange) -> Result<(), CursorError> {
        if range.is_empty() {
            return Ok(());
        }
        if let Some(current) = self.store.load() {
            if range.to_block <= current {
                tracing::debug!(current, to = range.to_block, "cursor already past range end");
                return Ok(());
            }
        }
        self.store.save(range.to_block)?;
        tracing::debug!(last_scanned = range.to_block, "cursor advanced");
        Ok(())
    }

    fn load_or_seed(&self, head: u64) -> Result<ScanCursor, CursorError> {
        if let Some(last) = self.store.load() {
            return Ok(ScanCursor::new(last));
        }
        let seeded = ScanCursor::seeded(head);
        tracing::warn!(
            head,
            last_scanned = seeded.last_scanned_block,
            "no prior cursor, starting from current head"
        );
        self.store.save(seeded.last_scanned_block)?;
        Ok(seeded)
    }
}

fn normalize(raw: Vec<RawEvent>, range: &ScanRange) -> Vec<RelayEvent> {
    raw.into_iter()
        .filter_map(|r| {
            let tx = r.transaction_hash.map(to_hex);
            match RelayEvent::from_raw(r) {
                Ok(ev) if range.contains(ev.source_block) => Some(ev),
                Ok(ev) => {
                    tracing::warn!(
                        source_tx = %to_hex(ev.source_tx_hash),
                        block = ev.source_block,
                        from = range.from_block,
                        to = range.to_block,
                        "event outside scanned range, skipping"
                    );
                    None
                }
                Err(missing) => {
                    tracing::warn!(
                        source_tx = tx.as_deref().unwrap_or("unknown"),
                        missing,
                        "malformed event, skipping"
                    );
                    None
                }
            }
        })
        .collect()
}

fn log_source_failure(e: &LedgerError, during: &str) {
    match e {
        LedgerError::BlockNotFound(_) => {
            tracing::warn!(reason = %e, during, "block not found (possible reorg), will retry");
        }
        _ => tracing::error!(reason = %e, during, "source ledger error, will retry"),
    }
}
