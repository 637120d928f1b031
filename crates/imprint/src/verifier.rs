//! Verifier: dispute resolution by recomputing fingerprints.
//!
//! Given a record id, the stored record is canonicalized again and compared
//! with the fingerprint persisted on its imprint. Given raw content, the
//! content is fingerprinted and matched against registered records. Both
//! paths are read-only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use imprint_core::{
    fingerprint_record, ContentRecord, Fingerprint, Imprint, ImprintStatus, ProofDescriptor,
    RecordId, ValidationError,
};
use imprint_ledger::explorer_url;
use imprint_store::Store;

use crate::error::VerifyError;

/// What to verify. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub record_id: Option<RecordId>,
    pub raw_content: Option<ContentRecord>,
}

impl VerifyRequest {
    pub fn by_record_id(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(RecordId::new(record_id)),
            raw_content: None,
        }
    }

    pub fn by_content(record: ContentRecord) -> Self {
        Self {
            record_id: None,
            raw_content: Some(record),
        }
    }
}

/// Why a verification did or did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// The computed fingerprint equals the persisted one.
    Verified,
    /// The record changed since its fingerprint was persisted.
    Mismatch,
    /// The record exists but has no imprint carrying a fingerprint.
    NoStoredFingerprint,
    /// No registered record has this content's fingerprint.
    NoMatchingRecord,
    /// Storage could not be read, or the stored record no longer
    /// canonicalizes. The result's `detail` says which.
    LookupFailed,
}

/// The verdict of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    #[serde(rename = "match")]
    pub matched: bool,
    pub proof: Option<ProofDescriptor>,
    pub computed_fingerprint: Option<Fingerprint>,
    pub stored_fingerprint: Option<Fingerprint>,
    pub status: VerificationStatus,
    pub record_id: Option<RecordId>,
    pub imprint_status: Option<ImprintStatus>,
    pub explorer_url: Option<String>,
    /// Why the lookup failed; only set with [`VerificationStatus::LookupFailed`].
    pub detail: Option<String>,
}

impl VerificationResult {
    fn unmatched(status: VerificationStatus) -> Self {
        Self {
            matched: false,
            proof: None,
            computed_fingerprint: None,
            stored_fingerprint: None,
            status,
            record_id: None,
            imprint_status: None,
            explorer_url: None,
            detail: None,
        }
    }

    fn lookup_failed(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::unmatched(VerificationStatus::LookupFailed)
        }
    }
}

/// Verifies content against persisted fingerprints.
pub struct Verifier<S: Store> {
    store: Arc<S>,
    explorer_base: Option<String>,
}

impl<S: Store> Verifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            explorer_base: None,
        }
    }

    /// Include explorer links for proofs in results.
    pub fn with_explorer_base(mut self, base: impl Into<String>) -> Self {
        self.explorer_base = Some(base.into());
        self
    }

    /// Verify a record id or raw content.
    pub async fn verify(&self, request: VerifyRequest) -> Result<VerificationResult, VerifyError> {
        let record_id = request.record_id.filter(|id| !id.is_blank());
        match (record_id, request.raw_content) {
            (Some(id), None) => self.verify_record(&id).await,
            (None, Some(content)) => self.verify_content(&content).await,
            (Some(_), Some(_)) => Err(ValidationError::AmbiguousVerificationInput.into()),
            (None, None) => Err(ValidationError::MissingVerificationInput.into()),
        }
    }

    async fn verify_record(&self, record_id: &RecordId) -> Result<VerificationResult, VerifyError> {
        let stored = match self.store.get_record(record_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(VerifyError::NotFound(record_id.clone())),
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "record lookup failed");
                return Ok(VerificationResult {
                    record_id: Some(record_id.clone()),
                    ..VerificationResult::lookup_failed(e.to_string())
                });
            }
        };

        let computed = match fingerprint_record(&stored.record) {
            Ok(fp) => fp,
            Err(e) => {
                return Ok(VerificationResult {
                    record_id: Some(record_id.clone()),
                    ..VerificationResult::lookup_failed(format!("stored record is malformed: {}", e))
                })
            }
        };

        Ok(self.compare(record_id, computed).await)
    }

    async fn verify_content(&self, content: &ContentRecord) -> Result<VerificationResult, VerifyError> {
        let computed = fingerprint_record(content)?;

        let matches = match self.store.find_records_by_fingerprint(&computed).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(fingerprint = %computed, error = %e, "fingerprint lookup failed");
                return Ok(VerificationResult {
                    computed_fingerprint: Some(computed),
                    ..VerificationResult::lookup_failed(e.to_string())
                });
            }
        };

        // The fingerprint covers the record id, so at most one record matches.
        let Some(record_id) = matches.into_iter().next() else {
            debug!(fingerprint = %computed, "no registered record for content");
            return Ok(VerificationResult {
                computed_fingerprint: Some(computed),
                ..VerificationResult::unmatched(VerificationStatus::NoMatchingRecord)
            });
        };

        Ok(self.compare(&record_id, computed).await)
    }

    /// Compare a computed fingerprint with the one persisted on the record's
    /// current imprint.
    async fn compare(&self, record_id: &RecordId, computed: Fingerprint) -> VerificationResult {
        let base = VerificationResult {
            record_id: Some(record_id.clone()),
            computed_fingerprint: Some(computed),
            ..VerificationResult::unmatched(VerificationStatus::NoStoredFingerprint)
        };

        let imprint: Imprint = match self.store.current_imprint(record_id).await {
            Ok(Some(imprint)) => imprint,
            Ok(None) => return base,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "imprint lookup failed");
                return VerificationResult {
                    status: VerificationStatus::LookupFailed,
                    detail: Some(e.to_string()),
                    ..base
                };
            }
        };

        let matched = imprint.fingerprint == computed;
        let proof = imprint.effective_proof().cloned();
        let explorer = match (&self.explorer_base, &proof) {
            (Some(root), Some(proof)) => Some(explorer_url(root, &proof.transaction_id)),
            _ => None,
        };

        debug!(record_id = %record_id, matched, status = %imprint.status, "verified");

        VerificationResult {
            matched,
            proof,
            stored_fingerprint: Some(imprint.fingerprint),
            status: if matched {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Mismatch
            },
            imprint_status: Some(imprint.status),
            explorer_url: explorer,
            ..base
        }
    }
}
