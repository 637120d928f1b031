//! Error types for Imprint Core.

use thiserror::Error;

use crate::imprint::ImprintStatus;
use crate::ledger_ids::TransactionId;

/// Core errors for parsing identifiers and encoding values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Malformed input handed to the canonicalizer or the verifier.
///
/// Always the caller's fault; never retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record id is missing")]
    MissingRecordId,

    #[error("author id is missing")]
    MissingAuthorId,

    #[error("either a record id or raw content must be supplied")]
    MissingVerificationInput,

    #[error("supply a record id or raw content, not both")]
    AmbiguousVerificationInput,

    #[error("malformed content: {0}")]
    Malformed(String),
}

/// A lifecycle event that the imprint state machine refuses.
///
/// Events on terminal imprints are not errors; they are reported as
/// [`Transition::Ignored`](crate::imprint::Transition::Ignored).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("event {event} is not valid in state {from}")]
    Invalid {
        from: ImprintStatus,
        event: &'static str,
    },

    #[error("receipt proof has no sequence number")]
    IncompleteProof,

    #[error("receipt is for transaction {got}, but {expected} was submitted")]
    TransactionMismatch {
        expected: TransactionId,
        got: TransactionId,
    },
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        ValidationError::Malformed(e.to_string())
    }
}
