//! Imprint: one attempt at anchoring a record's fingerprint on the ledger.
//!
//! ```text
//!            request            submit_accepted          receipt_obtained
//!   none ───────────► pending ─────────────────► submitted ─────────────► confirmed
//!     │                  │                          │
//!     │ duplicate_found  │ submission_failed        │ submission_failed
//!     ▼                  ▼                          ▼
//!  duplicate           failed ◄─────────────────────┘
//! ```
//!
//! `confirmed`, `failed` and `duplicate` are terminal. Events on a terminal
//! imprint are ignored, never applied. A retry after `failed` starts a new
//! attempt via [`Imprint::next_attempt`]; the failed attempt stays as history.
//!
//! Invariant: `proof` is `Some` iff the status is `submitted` or `confirmed`,
//! and a confirmed proof always carries a sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;
use crate::fingerprint::Fingerprint;
use crate::ledger_ids::{TopicId, TransactionId};
use crate::record::RecordId;

/// Lifecycle status of an imprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImprintStatus {
    None,
    Pending,
    Submitted,
    Confirmed,
    Failed,
    Duplicate,
}

impl ImprintStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImprintStatus::Confirmed | ImprintStatus::Failed | ImprintStatus::Duplicate
        )
    }

    /// Submission requested but no final answer yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ImprintStatus::Pending | ImprintStatus::Submitted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImprintStatus::None => "none",
            ImprintStatus::Pending => "pending",
            ImprintStatus::Submitted => "submitted",
            ImprintStatus::Confirmed => "confirmed",
            ImprintStatus::Failed => "failed",
            ImprintStatus::Duplicate => "duplicate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ImprintStatus::None),
            "pending" => Some(ImprintStatus::Pending),
            "submitted" => Some(ImprintStatus::Submitted),
            "confirmed" => Some(ImprintStatus::Confirmed),
            "failed" => Some(ImprintStatus::Failed),
            "duplicate" => Some(ImprintStatus::Duplicate),
            _ => None,
        }
    }
}

impl fmt::Display for ImprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to independently look up a submission on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDescriptor {
    pub topic_id: TopicId,
    /// Assigned by consensus; absent until a receipt is obtained.
    pub sequence_number: Option<u64>,
    pub transaction_id: TransactionId,
    pub submitted_at: DateTime<Utc>,
}

impl ProofDescriptor {
    /// True once consensus has assigned a sequence number.
    pub fn is_final(&self) -> bool {
        self.sequence_number.is_some()
    }
}

/// Events reported by the submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImprintEvent {
    /// The ledger accepted the transaction; the proof may lack a sequence number.
    SubmitAccepted(ProofDescriptor),
    /// A receipt with a sequence number was obtained.
    ReceiptObtained(ProofDescriptor),
    /// Unrecoverable failure for this attempt.
    SubmissionFailed(String),
    /// The fingerprint already carries a proof from an earlier imprint.
    DuplicateFound(ProofDescriptor),
}

impl ImprintEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ImprintEvent::SubmitAccepted(_) => "submit_accepted",
            ImprintEvent::ReceiptObtained(_) => "receipt_obtained",
            ImprintEvent::SubmissionFailed(_) => "submission_failed",
            ImprintEvent::DuplicateFound(_) => "duplicate_found",
        }
    }
}

/// Outcome of feeding an event to an imprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The event moved the imprint to a new state.
    Applied(Imprint),
    /// The imprint is terminal; nothing changed.
    Ignored,
}

/// One anchoring attempt for a content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Imprint {
    pub record_id: RecordId,
    /// 1-based attempt number.
    pub attempt: u32,
    pub fingerprint: Fingerprint,
    pub status: ImprintStatus,
    pub proof: Option<ProofDescriptor>,
    /// The earlier proof a `duplicate` imprint points at.
    pub duplicate_of: Option<ProofDescriptor>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Imprint {
    /// A fresh imprint at `none`, created alongside its record.
    pub fn new(record_id: RecordId, fingerprint: Fingerprint, at: DateTime<Utc>) -> Self {
        Self {
            record_id,
            attempt: 1,
            fingerprint,
            status: ImprintStatus::None,
            proof: None,
            duplicate_of: None,
            failure_reason: None,
            updated_at: at,
        }
    }

    /// A new attempt following a failed one. `None` unless this imprint failed.
    pub fn next_attempt(&self, fingerprint: Fingerprint, at: DateTime<Utc>) -> Option<Self> {
        if self.status != ImprintStatus::Failed {
            return None;
        }
        Some(Self {
            attempt: self.attempt + 1,
            ..Self::new(self.record_id.clone(), fingerprint, at)
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The proof a verifier should present: this attempt's own, or the one it
    /// duplicates.
    pub fn effective_proof(&self) -> Option<&ProofDescriptor> {
        self.proof.as_ref().or(self.duplicate_of.as_ref())
    }

    /// Move `none` to `pending`.
    pub fn request(&self, at: DateTime<Utc>) -> Result<Transition, TransitionError> {
        match self.status {
            ImprintStatus::None => Ok(Transition::Applied(Self {
                status: ImprintStatus::Pending,
                updated_at: at,
                ..self.clone()
            })),
            s if s.is_terminal() => Ok(Transition::Ignored),
            from => Err(TransitionError::Invalid {
                from,
                event: "request",
            }),
        }
    }

    /// Apply a lifecycle event.
    pub fn apply(
        &self,
        event: ImprintEvent,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        if self.is_terminal() {
            return Ok(Transition::Ignored);
        }

        let invalid = TransitionError::Invalid {
            from: self.status,
            event: event.name(),
        };

        let next = match (self.status, event) {
            (ImprintStatus::None, ImprintEvent::DuplicateFound(existing)) => Self {
                status: ImprintStatus::Duplicate,
                duplicate_of: Some(existing),
                ..self.clone()
            },
            (ImprintStatus::Pending, ImprintEvent::SubmitAccepted(partial)) => Self {
                status: ImprintStatus::Submitted,
                proof: Some(partial),
                ..self.clone()
            },
            (ImprintStatus::Submitted, ImprintEvent::ReceiptObtained(full)) => {
                if !full.is_final() {
                    return Err(TransitionError::IncompleteProof);
                }
                if let Some(submitted) = &self.proof {
                    if submitted.transaction_id != full.transaction_id {
                        return Err(TransitionError::TransactionMismatch {
                            expected: submitted.transaction_id,
                            got: full.transaction_id,
                        });
                    }
                }
                Self {
                    status: ImprintStatus::Confirmed,
                    proof: Some(full),
                    ..self.clone()
                }
            }
            (ImprintStatus::Pending | ImprintStatus::Submitted, ImprintEvent::SubmissionFailed(reason)) => {
                Self {
                    status: ImprintStatus::Failed,
                    proof: None,
                    failure_reason: Some(reason),
                    ..self.clone()
                }
            }
            _ => return Err(invalid),
        };

        Ok(Transition::Applied(Self {
            updated_at: at,
            ..next
        }))
    }
}
