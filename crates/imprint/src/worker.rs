//! Background submission queue.
//!
//! Ledger calls stay off the request path: callers enqueue a record id and a
//! single worker task anchors records one at a time. Dropping every
//! [`SubmissionQueue`] handle closes the channel; the worker drains what is
//! left and exits with its stats.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use imprint_core::RecordId;
use imprint_ledger::LedgerClient;
use imprint_store::Store;

use crate::error::{NotaryError, Result};
use crate::notary::{AnchorOutcome, Notary};

/// Counts of what the worker did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub processed: usize,
    pub confirmed: usize,
    pub submitted: usize,
    pub duplicate: usize,
    pub failed: usize,
    /// In flight elsewhere or already final.
    pub skipped: usize,
    /// `anchor` returned an error (missing record, storage, configuration).
    pub errors: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: &AnchorOutcome) {
        match outcome {
            AnchorOutcome::Confirmed(_) => self.confirmed += 1,
            AnchorOutcome::Submitted(_) => self.submitted += 1,
            AnchorOutcome::Duplicate(_) => self.duplicate += 1,
            AnchorOutcome::Failed(_) => self.failed += 1,
            AnchorOutcome::InFlight(_) | AnchorOutcome::AlreadyFinal(_) => self.skipped += 1,
        }
    }
}

/// Handle for queueing records to be anchored.
#[derive(Clone)]
pub struct SubmissionQueue {
    tx: mpsc::Sender<RecordId>,
}

impl SubmissionQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn<S, C>(notary: Notary<S, C>, capacity: usize) -> (Self, JoinHandle<WorkerStats>)
    where
        S: Store + 'static,
        C: LedgerClient + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(notary, rx));
        (Self { tx }, handle)
    }

    /// Queue a record. Waits while the queue is full.
    pub async fn enqueue(&self, record_id: RecordId) -> Result<()> {
        self.tx
            .send(record_id)
            .await
            .map_err(|_| NotaryError::QueueClosed)
    }
}

async fn run<S, C>(notary: Notary<S, C>, mut rx: mpsc::Receiver<RecordId>) -> WorkerStats
where
    S: Store + 'static,
    C: LedgerClient + 'static,
{
    let mut stats = WorkerStats::default();

    while let Some(record_id) = rx.recv().await {
        stats.processed += 1;
        match notary.anchor(&record_id).await {
            Ok(outcome) => {
                let imprint = outcome.imprint();
                info!(
                    record_id = %record_id,
                    attempt = imprint.attempt,
                    status = %imprint.status,
                    "queued anchor finished"
                );
                stats.record(&outcome);
            }
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "queued anchor failed");
                stats.errors += 1;
            }
        }
    }

    info!(processed = stats.processed, "submission worker stopped");
    stats
}
