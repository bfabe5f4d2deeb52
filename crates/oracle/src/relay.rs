//! Relay loop: scan, submit each event in order, sleep; repeat until shutdown.
//!
//! One cycle runs to completion (including receipt waits) before the next begins, which keeps
//! nonce allocation sequential. Shutdown is observed only between cycles.

use crate::abi::{to_hex, EventKind};
use crate::cursor::CursorError;
use crate::planner::ScanRange;
use crate::scanner::EventScanner;
use crate::submitter::{SubmissionOutcome, TransactionSubmitter};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

/// Failure that aborts a whole cycle.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cursor store: {0}")]
    Cursor(#[from] CursorError),
}

/// When the cursor moves past a scanned range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorCommit {
    /// Advance before submitting (at-most-once: a crash mid-batch skips the rest of it).
    #[default]
    BeforeSubmit,
    /// Advance only once every event in the range is settled; a transient failure leaves the
    /// range to be rescanned and the gate absorbs the repeats.
    AfterSubmit,
}

impl FromStr for CursorCommit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before-submit" => Ok(CursorCommit::BeforeSubmit),
            "after-submit" => Ok(CursorCommit::AfterSubmit),
            other => Err(format!(
                "unknown cursor commit policy {other:?} (expected before-submit or after-submit)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub event_kind: EventKind,
    pub required_confirmations: u64,
    /// Normal sleep between cycles; doubled after a cycle error.
    pub scan_interval: Duration,
    pub cursor_commit: CursorCommit,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Scanned range; `None` when nothing was scanned.
    pub range: Option<ScanRange>,
    pub events: usize,
    pub submitted: usize,
    pub already_processed: usize,
    pub rejected: usize,
    pub transient: usize,
    pub cursor_committed: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: &SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Submitted(_) => self.submitted += 1,
            SubmissionOutcome::AlreadyProcessed => self.already_processed += 1,
            SubmissionOutcome::Rejected(_) => self.rejected += 1,
            SubmissionOutcome::TransientFailure(_) => self.transient += 1,
        }
    }
}

pub struct RelayLoop {
    scanner: EventScanner,
    submitter: TransactionSubmitter,
    settings: RelaySettings,
}

impl RelayLoop {
    pub fn new(
        scanner: EventScanner,
        submitter: TransactionSubmitter,
        settings: RelaySettings,
    ) -> Self {
        Self {
            scanner,
            submitter,
            settings,
        }
    }

    /// One plan → scan → submit pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, RelayError> {
        let settings = &self.settings;
        let Some(batch) = self
            .scanner
            .scan_pending(&settings.event_kind, settings.required_confirmations)
            .await?
        else {
            return Ok(CycleReport::default());
        };

        let mut report = CycleReport {
            range: Some(batch.range),
            events: batch.events.len(),
            ..Default::default()
        };
        if settings.cursor_commit == CursorCommit::BeforeSubmit {
            self.scanner.commit(batch.range)?;
            report.cursor_committed = true;
        }

        for event in &batch.events {
            let outcome = self.submitter.submit(event).await;
            tracing::info!(
                source_tx = %to_hex(event.source_tx_hash),
                block = event.source_block,
                %outcome,
                "event handled"
            );
            report.record(&outcome);
        }

        if settings.cursor_commit == CursorCommit::AfterSubmit {
            if report.transient == 0 {
                self.scanner.commit(batch.range)?;
                report.cursor_committed = true;
            } else {
                tracing::warn!(
                    from = batch.range.from_block,
                    to = batch.range.to_block,
                    transient = report.transient,
                    "unsettled events, range will be rescanned"
                );
            }
        }
        Ok(report)
    }

    /// Run cycles until `shutdown` turns true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            event = self.settings.event_kind.name,
            confirmations = self.settings.required_confirmations,
            interval_secs = self.settings.scan_interval.as_secs(),
            "relay loop starting"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            let pause = match self.run_cycle().await {
                Ok(report) => {
                    if report.events == 0 {
                        tracing::info!("no new events found in this cycle");
                    } else {
                        tracing::info!(
                            events = report.events,
                            submitted = report.submitted,
                            already_processed = report.already_processed,
                            rejected = report.rejected,
                            transient = report.transient,
                            cursor_committed = report.cursor_committed,
                            "cycle complete"
                        );
                    }
                    self.settings.scan_interval
                }
                Err(e) => {
                    tracing::error!(
                        severity = "critical",
                        reason = %e,
                        "critical error in relay cycle, backing off"
                    );
                    backoff(self.settings.scan_interval)
                }
            };
            tracing::debug!(secs = pause.as_secs(), "sleeping");
            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("shutdown signal received, relay loop stopped");
    }
}

/// Pause after a failed cycle: twice the normal interval.
fn backoff(interval: Duration) -> Duration {
    interval.saturating_mul(2)
}
