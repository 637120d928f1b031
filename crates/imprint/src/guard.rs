//! Duplicate Guard: fingerprint novelty before any ledger write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use imprint_core::{Fingerprint, Imprint, ProofDescriptor};
use imprint_store::{BeginOutcome, Store, StoreError};

/// Checks fingerprints against earlier proofs.
///
/// [`check_duplicate`](Self::check_duplicate) is a plain read. The decision
/// that gates a submission is [`claim`](Self::claim), which runs the lookup
/// and the imprint write atomically inside the store.
pub struct DuplicateGuard<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for DuplicateGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> DuplicateGuard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The proof already recorded for `fingerprint`, if any.
    pub async fn check_duplicate(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ProofDescriptor>, StoreError> {
        Ok(self
            .store
            .get_claim(fingerprint)
            .await?
            .and_then(|claim| claim.proof))
    }

    /// Claim `candidate`'s fingerprint and persist it at `pending`, or at
    /// `duplicate` when a proof already exists.
    pub async fn claim(
        &self,
        candidate: &Imprint,
        at: DateTime<Utc>,
    ) -> Result<BeginOutcome, StoreError> {
        let outcome = self.store.begin_attempt(candidate, at).await?;
        if let BeginOutcome::Duplicate(dup) = &outcome {
            debug!(
                record_id = %dup.record_id,
                attempt = dup.attempt,
                fingerprint = %dup.fingerprint,
                "fingerprint already anchored"
            );
        }
        Ok(outcome)
    }
}
