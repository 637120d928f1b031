//! Store trait: the persistence boundary for records and imprints.
//!
//! The content store proper belongs to the application; this trait captures
//! exactly what the notary and verifier need from it. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imprint_core::{
    ContentRecord, Fingerprint, Imprint, ImprintEvent, ImprintStatus, ProofDescriptor, RecordId,
    Transition,
};

use crate::error::{Result, StoreError};

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted, with a fresh imprint at `none`.
    Inserted,
    /// A record with this id already exists (not an error).
    AlreadyExists,
}

/// A record together with the fingerprint persisted when it was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: ContentRecord,
    pub fingerprint: Fingerprint,
    pub registered_at: DateTime<Utc>,
}

/// Ownership of a fingerprint by one imprint attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub fingerprint: Fingerprint,
    pub record_id: RecordId,
    pub attempt: u32,
    /// The owner's proof once the ledger has accepted its submission.
    pub proof: Option<ProofDescriptor>,
}

impl Claim {
    fn owned_by(&self, imprint: &Imprint) -> bool {
        self.record_id == imprint.record_id && self.attempt == imprint.attempt
    }
}

/// Result of [`Store::begin_attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The fingerprint was claimed and the imprint persisted at `pending`.
    Pending(Imprint),
    /// The fingerprint already carries a proof; the imprint was persisted at
    /// `duplicate` pointing at it.
    Duplicate(Imprint),
    /// An in-flight attempt owns the fingerprint. Nothing was written.
    InFlight(Claim),
    /// The candidate's attempt already moved past `none`; this is the stored
    /// row. Nothing was written.
    Superseded(Imprint),
}

/// Result of [`Store::save_imprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The stored attempt is no longer at the expected status. Nothing was
    /// written; this is the stored row.
    Conflict(Imprint),
}

/// What saving a `failed` attempt does to the proof on its fingerprint claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProofRetention {
    /// The ledger never took the message: withdraw the proof so a retry
    /// submits again.
    #[default]
    Withdraw,
    /// The message may be on the ledger: keep the proof so a retry becomes
    /// `duplicate` instead of writing it twice.
    Keep,
}

/// The Store trait: async interface for record and imprint persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record with its fingerprint, and its first imprint at `none`.
    async fn insert_record(
        &self,
        record: &ContentRecord,
        fingerprint: &Fingerprint,
        at: DateTime<Utc>,
    ) -> Result<InsertResult>;

    /// Overwrite a record's content. The persisted fingerprint is untouched.
    ///
    /// Returns `NotFound` if the record does not exist.
    async fn update_record(&self, record: &ContentRecord) -> Result<()>;

    /// Get a record and its persisted fingerprint.
    async fn get_record(&self, id: &RecordId) -> Result<Option<StoredRecord>>;

    /// Reverse lookup: records whose persisted fingerprint equals `fingerprint`.
    async fn find_records_by_fingerprint(&self, fingerprint: &Fingerprint)
        -> Result<Vec<RecordId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Imprints
    // ─────────────────────────────────────────────────────────────────────────

    /// The highest attempt for a record.
    async fn current_imprint(&self, id: &RecordId) -> Result<Option<Imprint>>;

    /// Every attempt for a record, oldest first.
    async fn imprint_history(&self, id: &RecordId) -> Result<Vec<Imprint>>;

    /// Persist an imprint transition that started from `expected`.
    ///
    /// Compare-and-set: the row is written only if the stored attempt is still
    /// at `expected`, otherwise the stored row comes back as a conflict.
    /// Also keeps the fingerprint claim in step: `submitted` and `confirmed`
    /// publish the proof on the claim, `failed` withdraws it unless
    /// `retention` keeps it.
    ///
    /// Returns `NotFound` if the attempt does not exist.
    async fn save_imprint(
        &self,
        imprint: &Imprint,
        expected: ImprintStatus,
        retention: ProofRetention,
    ) -> Result<SaveOutcome>;

    /// Current imprints whose status is `pending` or `submitted`.
    async fn list_in_flight(&self) -> Result<Vec<Imprint>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Fingerprint claims
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically check the fingerprint claim and persist the attempt.
    ///
    /// `candidate` must be at `none`. The claim lookup, the claim write and the
    /// imprint write happen under one transaction, so two concurrent requests
    /// for the same fingerprint cannot both reach `pending`.
    async fn begin_attempt(&self, candidate: &Imprint, at: DateTime<Utc>) -> Result<BeginOutcome>;

    /// Look up the claim on a fingerprint.
    async fn get_claim(&self, fingerprint: &Fingerprint) -> Result<Option<Claim>>;
}

/// What `begin_attempt` should do, decided from the existing claim.
#[derive(Debug)]
pub(crate) enum ClaimDecision {
    /// Write (or overwrite) the claim for the candidate and persist it at `pending`.
    Claim(Imprint),
    /// Persist the candidate at `duplicate`; leave the claim alone.
    Duplicate(Imprint),
    /// Leave everything alone.
    InFlight(Claim),
    /// Leave everything alone; the candidate is stale.
    Superseded(Imprint),
}

/// Shared `begin_attempt` logic for all backends.
///
/// `stored` is the row already persisted for the candidate's attempt, if any.
/// `owner_status` is the status of the attempt that currently owns the claim,
/// if any.
pub(crate) fn decide_claim(
    candidate: &Imprint,
    stored: Option<Imprint>,
    existing: Option<Claim>,
    owner_status: Option<ImprintStatus>,
    at: DateTime<Utc>,
) -> Result<ClaimDecision> {
    if candidate.status != ImprintStatus::None {
        return Err(StoreError::InvalidData(format!(
            "attempt {} of {} is {}, expected none",
            candidate.attempt, candidate.record_id, candidate.status
        )));
    }

    if let Some(stored) = stored.filter(|s| s.status != ImprintStatus::None) {
        return Ok(ClaimDecision::Superseded(stored));
    }

    let claim = |imprint: &Imprint| -> Result<ClaimDecision> {
        match imprint.request(at) {
            Ok(Transition::Applied(pending)) => Ok(ClaimDecision::Claim(pending)),
            Ok(Transition::Ignored) => Err(StoreError::InvalidData(
                "request ignored on a fresh attempt".into(),
            )),
            Err(e) => Err(StoreError::InvalidData(e.to_string())),
        }
    };

    let Some(existing) = existing else {
        return claim(candidate);
    };

    if let Some(proof) = existing.proof.clone() {
        return match candidate.apply(ImprintEvent::DuplicateFound(proof), at) {
            Ok(Transition::Applied(dup)) => Ok(ClaimDecision::Duplicate(dup)),
            Ok(Transition::Ignored) => Err(StoreError::InvalidData(
                "duplicate ignored on a fresh attempt".into(),
            )),
            Err(e) => Err(StoreError::InvalidData(e.to_string())),
        };
    }

    // Includes a stale candidate for the very attempt that already went pending.
    if owner_status.is_some_and(ImprintStatus::is_in_flight) {
        return Ok(ClaimDecision::InFlight(existing));
    }

    claim(candidate)
}

/// The claim to write after persisting `imprint`, if it changes.
pub(crate) fn claim_after_save(
    existing: Option<&Claim>,
    imprint: &Imprint,
    retention: ProofRetention,
) -> Option<Claim> {
    match imprint.status {
        ImprintStatus::Submitted | ImprintStatus::Confirmed => Some(Claim {
            fingerprint: imprint.fingerprint,
            record_id: imprint.record_id.clone(),
            attempt: imprint.attempt,
            proof: imprint.proof.clone(),
        }),
        ImprintStatus::Failed if retention == ProofRetention::Keep => None,
        ImprintStatus::Failed => existing
            .filter(|c| c.owned_by(imprint) && c.proof.is_some())
            .map(|c| Claim {
                proof: None,
                ..c.clone()
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use imprint_core::{AccountId, TopicId, TransactionId};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    fn candidate(record: &str, attempt: u32) -> Imprint {
        Imprint {
            attempt,
            ..Imprint::new(RecordId::new(record), Fingerprint::hash(b"same"), at(0))
        }
    }

    fn claim(record: &str, attempt: u32, proof: Option<ProofDescriptor>) -> Claim {
        Claim {
            fingerprint: Fingerprint::hash(b"same"),
            record_id: RecordId::new(record),
            attempt,
            proof,
        }
    }

    fn proof() -> ProofDescriptor {
        ProofDescriptor {
            topic_id: TopicId::new(0, 0, 9),
            sequence_number: Some(4),
            transaction_id: TransactionId::generate(AccountId::new(0, 0, 2), at(0)),
            submitted_at: at(0),
        }
    }

    #[test]
    fn test_unclaimed_fingerprint_is_claimed() {
        let decision = decide_claim(&candidate("p", 1), None, None, None, at(1)).unwrap();
        assert!(matches!(decision, ClaimDecision::Claim(i) if i.status == ImprintStatus::Pending));
    }

    #[test]
    fn test_proof_on_claim_means_duplicate() {
        let existing = claim("p", 1, Some(proof()));
        let decision =
            decide_claim(&candidate("p", 2), None, Some(existing), Some(ImprintStatus::Confirmed), at(1))
                .unwrap();
        match decision {
            ClaimDecision::Duplicate(i) => {
                assert_eq!(i.status, ImprintStatus::Duplicate);
                assert_eq!(i.duplicate_of, Some(proof()));
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_in_flight_owner_blocks_other_attempts() {
        let existing = claim("p", 1, None);
        let decision =
            decide_claim(&candidate("p", 2), None, Some(existing.clone()), Some(ImprintStatus::Pending), at(1))
                .unwrap();
        assert!(matches!(decision, ClaimDecision::InFlight(c) if c == existing));
    }

    #[test]
    fn test_failed_owner_releases_claim() {
        let existing = claim("p", 1, None);
        let decision =
            decide_claim(&candidate("p", 2), None, Some(existing), Some(ImprintStatus::Failed), at(1))
                .unwrap();
        assert!(matches!(decision, ClaimDecision::Claim(i) if i.attempt == 2));
    }

    #[test]
    fn test_racing_request_for_same_attempt_is_in_flight() {
        let existing = claim("p", 1, None);
        let decision =
            decide_claim(&candidate("p", 1), None, Some(existing), Some(ImprintStatus::Pending), at(1))
                .unwrap();
        assert!(matches!(decision, ClaimDecision::InFlight(_)));
    }

    #[test]
    fn test_orphaned_claim_is_reclaimed() {
        let existing = claim("p", 1, None);
        let decision = decide_claim(&candidate("p", 1), None, Some(existing), None, at(1)).unwrap();
        assert!(matches!(decision, ClaimDecision::Claim(_)));
    }

    #[test]
    fn test_claim_follows_saved_status() {
        let mut imprint = candidate("p", 1);
        assert_eq!(claim_after_save(None, &imprint, ProofRetention::Withdraw), None);

        imprint.status = ImprintStatus::Submitted;
        imprint.proof = Some(proof());
        let published = claim_after_save(None, &imprint, ProofRetention::Withdraw).unwrap();
        assert_eq!(published.proof, Some(proof()));

        imprint.status = ImprintStatus::Failed;
        imprint.proof = None;
        let withdrawn = claim_after_save(Some(&published), &imprint, ProofRetention::Withdraw).unwrap();
        assert_eq!(withdrawn.proof, None);

        // a failure of some other attempt leaves the claim alone
        let other = claim("p", 7, Some(proof()));
        assert_eq!(claim_after_save(Some(&other), &imprint, ProofRetention::Withdraw), None);
    }

    #[test]
    fn test_stale_candidate_is_superseded() {
        let mut stored = candidate("p", 1);
        stored.status = ImprintStatus::Failed;
        stored.failure_reason = Some("operator abort".into());

        // the claim says "failed owner, reclaim", but the row moved on first
        let existing = claim("p", 1, None);
        let decision = decide_claim(
            &candidate("p", 1),
            Some(stored.clone()),
            Some(existing),
            Some(ImprintStatus::Failed),
            at(1),
        )
        .unwrap();
        assert!(matches!(decision, ClaimDecision::Superseded(i) if i == stored));

        // a row still at `none` is the candidate itself
        let decision =
            decide_claim(&candidate("p", 1), Some(candidate("p", 1)), None, None, at(1)).unwrap();
        assert!(matches!(decision, ClaimDecision::Claim(_)));
    }

    #[test]
    fn test_kept_proof_survives_failure() {
        let published = claim("p", 1, Some(proof()));
        let mut failed = candidate("p", 1);
        failed.status = ImprintStatus::Failed;

        assert_eq!(claim_after_save(Some(&published), &failed, ProofRetention::Keep), None);

        let decision =
            decide_claim(&candidate("p", 2), None, Some(published), Some(ImprintStatus::Failed), at(1))
                .unwrap();
        assert!(matches!(decision, ClaimDecision::Duplicate(i) if i.duplicate_of == Some(proof())));
    }

    #[test]
    fn test_candidate_must_be_fresh() {
        let mut c = candidate("p", 1);
        c.status = ImprintStatus::Pending;
        assert!(decide_claim(&c, None, None, None, at(1)).is_err());
    }
}
