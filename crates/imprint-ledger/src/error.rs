//! Error types for the ledger boundary.
//!
//! [`ClientError`] is what a [`LedgerClient`](crate::client::LedgerClient)
//! reports. The adapter normalizes it into [`LedgerError`] before anything
//! leaves this crate.

use std::time::Duration;

use thiserror::Error;

/// Why a submission or receipt query did not produce a proof. All retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionFailure {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("rejected by the ledger: {0}")]
    Rejected(String),

    #[error("receipt unavailable: {0}")]
    ReceiptUnavailable(String),
}

/// Errors surfaced by the ledger adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Missing or invalid operator credentials or topic. Fatal until
    /// configuration changes.
    #[error("ledger configuration error: {0}")]
    Config(String),

    /// The envelope could not be encoded; nothing was sent.
    #[error("envelope encoding failed: {0}")]
    Encoding(String),

    /// The ledger could not be reached or refused the message.
    #[error("ledger submission failed: {0}")]
    Submission(#[from] SubmissionFailure),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Submission(_))
    }
}

/// Errors reported by a ledger client implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection failure or server-side error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The operator account or its signature was refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Consensus refused the transaction.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Unknown topic or transaction.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with something we cannot read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for ledger adapter operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
