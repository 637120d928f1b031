//! The Notary: registration, anchoring and reconciliation.
//!
//! The notary ties the canonicalizer, the duplicate guard, the ledger adapter
//! and the imprint state machine together. Every transition is persisted
//! before the next network step, so a crash leaves an imprint that
//! [`Notary::reconcile`] can finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use imprint_core::{
    canonicalize, fingerprint, CanonicalForm, ContentRecord, Fingerprint, Imprint, ImprintEvent,
    ImprintStatus, LedgerEnvelope, RecordId, Transition,
};
use imprint_ledger::{LedgerAdapter, LedgerClient, LedgerError, SubmissionFailure};
use imprint_store::{BeginOutcome, InsertResult, ProofRetention, SaveOutcome, Store, StoredRecord};

use crate::config::NotaryConfig;
use crate::error::{NotaryError, Result};
use crate::guard::DuplicateGuard;
use crate::verifier::Verifier;

/// Failure reason for a `pending` imprint abandoned mid-submission.
pub const INTERRUPTED_REASON: &str = "interrupted before ledger acknowledgment";

/// Result of registering a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub record_id: RecordId,
    pub fingerprint: Fingerprint,
    /// False if the record was already registered.
    pub inserted: bool,
}

/// Result of [`Notary::anchor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// Receipt obtained; the proof carries a sequence number.
    Confirmed(Imprint),
    /// Accepted by the ledger; the receipt is left to reconciliation.
    Submitted(Imprint),
    /// The fingerprint was already anchored; nothing was submitted.
    Duplicate(Imprint),
    /// Another submission for this record is in progress.
    InFlight(Imprint),
    /// The record was already confirmed or a duplicate before this call.
    AlreadyFinal(Imprint),
    /// This attempt failed; `failure_reason` says why.
    Failed(Imprint),
}

impl AnchorOutcome {
    /// The outcome a caller sees for an imprint some other writer moved on.
    fn settled(imprint: Imprint) -> Self {
        match imprint.status {
            ImprintStatus::Confirmed => AnchorOutcome::Confirmed(imprint),
            ImprintStatus::Submitted => AnchorOutcome::Submitted(imprint),
            ImprintStatus::Duplicate => AnchorOutcome::Duplicate(imprint),
            ImprintStatus::Failed => AnchorOutcome::Failed(imprint),
            ImprintStatus::None | ImprintStatus::Pending => AnchorOutcome::InFlight(imprint),
        }
    }

    /// Short name of the outcome, e.g. `confirmed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorOutcome::Confirmed(_) => "confirmed",
            AnchorOutcome::Submitted(_) => "submitted",
            AnchorOutcome::Duplicate(_) => "duplicate",
            AnchorOutcome::InFlight(_) => "in_flight",
            AnchorOutcome::AlreadyFinal(_) => "already_final",
            AnchorOutcome::Failed(_) => "failed",
        }
    }

    pub fn imprint(&self) -> &Imprint {
        match self {
            AnchorOutcome::Confirmed(i)
            | AnchorOutcome::Submitted(i)
            | AnchorOutcome::Duplicate(i)
            | AnchorOutcome::InFlight(i)
            | AnchorOutcome::AlreadyFinal(i)
            | AnchorOutcome::Failed(i) => i,
        }
    }

    pub fn into_imprint(self) -> Imprint {
        match self {
            AnchorOutcome::Confirmed(i)
            | AnchorOutcome::Submitted(i)
            | AnchorOutcome::Duplicate(i)
            | AnchorOutcome::InFlight(i)
            | AnchorOutcome::AlreadyFinal(i)
            | AnchorOutcome::Failed(i) => i,
        }
    }
}

/// What a reconciliation sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// In-flight imprints looked at.
    pub examined: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Still in flight after the sweep.
    pub unchanged: usize,
}

/// The main Notary struct.
///
/// Cheap to clone; clones share the store and the ledger adapter.
pub struct Notary<S: Store, C: LedgerClient> {
    store: Arc<S>,
    ledger: Arc<LedgerAdapter<C>>,
    guard: DuplicateGuard<S>,
    config: NotaryConfig,
}

impl<S: Store, C: LedgerClient> Clone for Notary<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            guard: self.guard.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Store, C: LedgerClient> Notary<S, C> {
    /// Create a new notary.
    pub fn new(store: S, ledger: LedgerAdapter<C>, config: NotaryConfig) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(ledger), config)
    }

    /// Create a notary over handles shared with other components.
    pub fn from_shared(store: Arc<S>, ledger: Arc<LedgerAdapter<C>>, config: NotaryConfig) -> Self {
        Self {
            guard: DuplicateGuard::new(Arc::clone(&store)),
            store,
            ledger,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &LedgerAdapter<C> {
        &self.ledger
    }

    pub fn guard(&self) -> &DuplicateGuard<S> {
        &self.guard
    }

    /// A verifier over the same store, rendering explorer links like the adapter.
    pub fn verifier(&self) -> Verifier<S> {
        Verifier::new(Arc::clone(&self.store))
            .with_explorer_base(self.ledger.explorer_base().to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Fingerprint a record and persist both, with its first imprint at `none`.
    ///
    /// Registering an existing record id is not an error; the fingerprint
    /// registered the first time is returned.
    pub async fn register(&self, record: &ContentRecord) -> Result<Registration> {
        let canonical = canonicalize(record)?;
        let fp = fingerprint(&canonical)?;

        match self.store.insert_record(record, &fp, Utc::now()).await? {
            InsertResult::Inserted => {
                info!(record_id = %record.id, fingerprint = %fp, "registered record");
                Ok(Registration {
                    record_id: record.id.clone(),
                    fingerprint: fp,
                    inserted: true,
                })
            }
            InsertResult::AlreadyExists => {
                let stored = self.load(&record.id).await?;
                debug!(record_id = %record.id, "record already registered");
                Ok(Registration {
                    record_id: record.id.clone(),
                    fingerprint: stored.fingerprint,
                    inserted: false,
                })
            }
        }
    }

    pub async fn current_imprint(&self, record_id: &RecordId) -> Result<Imprint> {
        self.store
            .current_imprint(record_id)
            .await?
            .ok_or_else(|| NotaryError::NotFound(record_id.clone()))
    }

    /// Every attempt for a record, oldest first.
    pub async fn history(&self, record_id: &RecordId) -> Result<Vec<Imprint>> {
        let history = self.store.imprint_history(record_id).await?;
        if history.is_empty() {
            return Err(NotaryError::NotFound(record_id.clone()));
        }
        Ok(history)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a record's imprint to `pending`, or straight to `duplicate`.
    ///
    /// A `failed` imprint gets a new attempt. In-flight and final imprints are
    /// returned unchanged. Fails with [`LedgerError::Config`] before touching
    /// anything when no submission could be made.
    pub async fn request_submission(&self, record_id: &RecordId) -> Result<Imprint> {
        let (_, _, current) = self.prepare(record_id).await?;
        self.ledger.ensure_configured()?;

        match self.begin(current).await? {
            Begun::Claimed(pending) => Ok(pending),
            Begun::Settled(AnchorOutcome::AlreadyFinal(imprint)) => {
                warn!(
                    record_id = %record_id,
                    status = %imprint.status,
                    "submission requested for a final imprint; ignored"
                );
                Ok(imprint)
            }
            Begun::Settled(outcome) => Ok(outcome.into_imprint()),
        }
    }

    /// Apply a lifecycle event to a record's current imprint and persist it.
    ///
    /// Events on a terminal imprint are ignored with a warning and the stored
    /// imprint is returned untouched.
    pub async fn advance(&self, record_id: &RecordId, event: ImprintEvent) -> Result<Imprint> {
        let current = self.current_imprint(record_id).await?;
        self.apply(&current, event, Utc::now()).await
    }

    /// Run the whole pipeline for one record: request, submit, fetch receipt.
    ///
    /// Ledger failures after the imprint went `pending` are recorded on the
    /// imprint as `failed` and reported as [`AnchorOutcome::Failed`]. If
    /// another writer settles the attempt meanwhile, its state is reported.
    pub async fn anchor(&self, record_id: &RecordId) -> Result<AnchorOutcome> {
        let (_, canonical, current) = self.prepare(record_id).await?;
        self.ledger.ensure_configured()?;

        let pending = match self.begin(current).await? {
            Begun::Claimed(pending) => pending,
            Begun::Settled(outcome) => return Ok(outcome),
        };

        let envelope = LedgerEnvelope::new(&canonical, pending.fingerprint, Utc::now());
        let partial = match self.ledger.submit(&envelope).await {
            Ok(proof) => proof,
            Err(e) => {
                warn!(
                    record_id = %record_id,
                    attempt = pending.attempt,
                    error = %e,
                    "ledger submission failed"
                );
                let failed = self
                    .apply(&pending, ImprintEvent::SubmissionFailed(e.to_string()), Utc::now())
                    .await?;
                return Ok(AnchorOutcome::settled(failed));
            }
        };

        let submitted = self
            .apply(&pending, ImprintEvent::SubmitAccepted(partial.clone()), Utc::now())
            .await?;
        if submitted.status != ImprintStatus::Submitted {
            warn!(
                record_id = %record_id,
                attempt = submitted.attempt,
                status = %submitted.status,
                transaction_id = %partial.transaction_id,
                "attempt settled elsewhere while the ledger accepted it"
            );
            return Ok(AnchorOutcome::settled(submitted));
        }
        info!(
            record_id = %record_id,
            attempt = submitted.attempt,
            transaction_id = %partial.transaction_id,
            "submission accepted"
        );

        match self.ledger.query_receipt(&partial).await {
            Ok(full) => {
                let confirmed = self
                    .apply(&submitted, ImprintEvent::ReceiptObtained(full), Utc::now())
                    .await?;
                if confirmed.status == ImprintStatus::Confirmed {
                    info!(
                        record_id = %record_id,
                        attempt = confirmed.attempt,
                        sequence_number = ?confirmed.proof.as_ref().and_then(|p| p.sequence_number),
                        "imprint confirmed"
                    );
                }
                Ok(AnchorOutcome::settled(confirmed))
            }
            Err(LedgerError::Submission(SubmissionFailure::Rejected(reason))) => {
                warn!(record_id = %record_id, reason = %reason, "transaction rejected by consensus");
                let failed = self
                    .apply(
                        &submitted,
                        ImprintEvent::SubmissionFailed(format!("rejected by the ledger: {}", reason)),
                        Utc::now(),
                    )
                    .await?;
                Ok(AnchorOutcome::settled(failed))
            }
            Err(e) => {
                debug!(record_id = %record_id, error = %e, "receipt not yet available");
                Ok(AnchorOutcome::Submitted(submitted))
            }
        }
    }

    /// Finish or fail imprints stuck in flight.
    ///
    /// `pending` imprints older than `stale_after` were interrupted before the
    /// ledger answered and fail. `submitted` imprints get a receipt query:
    /// success confirms, rejection fails, and an unavailable receipt fails
    /// only once older than `receipt_deadline`. That last kind of failure
    /// keeps the proof on the fingerprint claim, since the message may still
    /// reach consensus; a retry then resolves to `duplicate`.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for imprint in self.store.list_in_flight().await? {
            report.examined += 1;

            let next = match (imprint.status, imprint.proof.clone()) {
                (ImprintStatus::Pending, _) => {
                    if older_than(now, imprint.updated_at, self.config.stale_after) {
                        Some((
                            ImprintEvent::SubmissionFailed(INTERRUPTED_REASON.into()),
                            ProofRetention::Withdraw,
                        ))
                    } else {
                        None
                    }
                }
                (ImprintStatus::Submitted, Some(partial)) => {
                    match self.ledger.query_receipt(&partial).await {
                        Ok(full) => Some((ImprintEvent::ReceiptObtained(full), ProofRetention::Withdraw)),
                        Err(LedgerError::Submission(SubmissionFailure::Rejected(reason))) => Some((
                            ImprintEvent::SubmissionFailed(format!("rejected by the ledger: {}", reason)),
                            ProofRetention::Withdraw,
                        )),
                        Err(e) if older_than(now, imprint.updated_at, self.config.receipt_deadline) => {
                            Some((
                                ImprintEvent::SubmissionFailed(format!(
                                    "no receipt within {}s: {}",
                                    self.config.receipt_deadline.as_secs(),
                                    e
                                )),
                                ProofRetention::Keep,
                            ))
                        }
                        Err(e) => {
                            debug!(record_id = %imprint.record_id, error = %e, "receipt still unavailable");
                            None
                        }
                    }
                }
                (status, _) => {
                    warn!(
                        record_id = %imprint.record_id,
                        attempt = imprint.attempt,
                        status = %status,
                        "in-flight imprint without a proof"
                    );
                    Some((
                        ImprintEvent::SubmissionFailed(INTERRUPTED_REASON.into()),
                        ProofRetention::Withdraw,
                    ))
                }
            };

            let Some((event, retention)) = next else {
                report.unchanged += 1;
                continue;
            };

            let updated = self.apply_with(&imprint, event, now, retention).await?;
            match updated.status {
                ImprintStatus::Confirmed => report.confirmed += 1,
                ImprintStatus::Failed => report.failed += 1,
                _ => report.unchanged += 1,
            }
        }

        info!(
            examined = report.examined,
            confirmed = report.confirmed,
            failed = report.failed,
            unchanged = report.unchanged,
            "reconciliation finished"
        );
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load(&self, record_id: &RecordId) -> Result<StoredRecord> {
        self.store
            .get_record(record_id)
            .await?
            .ok_or_else(|| NotaryError::NotFound(record_id.clone()))
    }

    /// Load a record, check it still matches its registered fingerprint, and
    /// fetch its current imprint.
    async fn prepare(&self, record_id: &RecordId) -> Result<(StoredRecord, CanonicalForm, Imprint)> {
        let stored = self.load(record_id).await?;
        let canonical = canonicalize(&stored.record)?;
        let current_fp = fingerprint(&canonical)?;

        if current_fp != stored.fingerprint {
            return Err(NotaryError::FingerprintChanged {
                record_id: record_id.clone(),
                registered: stored.fingerprint,
                current: current_fp,
            });
        }

        let current = self.current_imprint(record_id).await?;
        Ok((stored, canonical, current))
    }

    /// Start an attempt from the current imprint.
    async fn begin(&self, current: Imprint) -> Result<Begun> {
        let now = Utc::now();
        let candidate = match current.status {
            ImprintStatus::Confirmed | ImprintStatus::Duplicate => {
                return Ok(Begun::Settled(AnchorOutcome::AlreadyFinal(current)))
            }
            ImprintStatus::Pending | ImprintStatus::Submitted => {
                debug!(record_id = %current.record_id, status = %current.status, "already in flight");
                return Ok(Begun::Settled(AnchorOutcome::InFlight(current)));
            }
            ImprintStatus::None => current,
            ImprintStatus::Failed => match current.next_attempt(current.fingerprint, now) {
                Some(next) => next,
                None => return Ok(Begun::Settled(AnchorOutcome::Failed(current))),
            },
        };

        match self.guard.claim(&candidate, now).await? {
            BeginOutcome::Pending(pending) => {
                info!(
                    record_id = %pending.record_id,
                    attempt = pending.attempt,
                    fingerprint = %pending.fingerprint,
                    "submission requested"
                );
                Ok(Begun::Claimed(pending))
            }
            BeginOutcome::Duplicate(dup) => Ok(Begun::Settled(AnchorOutcome::Duplicate(dup))),
            BeginOutcome::InFlight(claim) => {
                debug!(
                    record_id = %claim.record_id,
                    attempt = claim.attempt,
                    "fingerprint claimed by an in-flight attempt"
                );
                let reloaded = self.current_imprint(&candidate.record_id).await?;
                Ok(Begun::Settled(AnchorOutcome::InFlight(reloaded)))
            }
            BeginOutcome::Superseded(stored) => {
                debug!(
                    record_id = %stored.record_id,
                    attempt = stored.attempt,
                    status = %stored.status,
                    "attempt moved on before it could be claimed"
                );
                let reloaded = self.current_imprint(&candidate.record_id).await?;
                Ok(Begun::Settled(AnchorOutcome::settled(reloaded)))
            }
        }
    }

    /// Apply an event and persist the result. Ignored events leave the store
    /// untouched and return the imprint as it was.
    async fn apply(&self, imprint: &Imprint, event: ImprintEvent, at: DateTime<Utc>) -> Result<Imprint> {
        self.apply_with(imprint, event, at, ProofRetention::Withdraw).await
    }

    /// Like [`apply`](Self::apply), choosing what a failure does to the claim.
    ///
    /// The write only lands if the stored attempt is still at `imprint`'s
    /// status. When another writer got there first, the stored row wins and
    /// is returned.
    async fn apply_with(
        &self,
        imprint: &Imprint,
        event: ImprintEvent,
        at: DateTime<Utc>,
        retention: ProofRetention,
    ) -> Result<Imprint> {
        let event_name = event.name();
        match imprint.apply(event, at)? {
            Transition::Applied(next) => {
                match self.store.save_imprint(&next, imprint.status, retention).await? {
                    SaveOutcome::Saved => {
                        debug!(
                            record_id = %next.record_id,
                            attempt = next.attempt,
                            from = %imprint.status,
                            to = %next.status,
                            event = event_name,
                            "imprint transition"
                        );
                        Ok(next)
                    }
                    SaveOutcome::Conflict(stored) => {
                        warn!(
                            record_id = %stored.record_id,
                            attempt = stored.attempt,
                            expected = %imprint.status,
                            stored = %stored.status,
                            event = event_name,
                            "imprint changed concurrently; transition dropped"
                        );
                        Ok(stored)
                    }
                }
            }
            Transition::Ignored => {
                warn!(
                    record_id = %imprint.record_id,
                    attempt = imprint.attempt,
                    status = %imprint.status,
                    event = event_name,
                    "event on a terminal imprint ignored"
                );
                Ok(imprint.clone())
            }
        }
    }
}

/// Whether an attempt was started by this call.
enum Begun {
    /// Claimed and persisted at `pending`; the caller submits it.
    Claimed(Imprint),
    Settled(AnchorOutcome),
}

fn older_than(now: DateTime<Utc>, since: DateTime<Utc>, age: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed >= age)
        .unwrap_or(false)
}
