//! Error types for the notary and verifier.

use imprint_core::{CoreError, Fingerprint, RecordId, TransitionError, ValidationError};
use imprint_ledger::LedgerError;
use imprint_store::StoreError;
use thiserror::Error;

/// Errors that can occur during notary operations.
#[derive(Debug, Error)]
pub enum NotaryError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A canonical form or envelope could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The state machine refused an event.
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The record was edited after registration; its registered fingerprint
    /// no longer describes it.
    #[error("record {record_id} no longer matches its registered fingerprint {registered}")]
    FingerprintChanged {
        record_id: RecordId,
        registered: Fingerprint,
        current: Fingerprint,
    },

    /// The submission queue's worker has stopped.
    #[error("submission queue is closed")]
    QueueClosed,
}

/// Result type for notary operations.
pub type Result<T> = std::result::Result<T, NotaryError>;

/// Errors a verification request can fail with. Everything else degrades to
/// a non-matching result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("record not found: {0}")]
    NotFound(RecordId),
}

impl VerifyError {
    /// The HTTP status a surface should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            VerifyError::Validation(_) => 400,
            VerifyError::NotFound(_) => 404,
        }
    }
}
