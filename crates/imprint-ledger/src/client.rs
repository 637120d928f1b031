//! Client abstraction for the consensus service.
//!
//! A client delivers one signed message to a topic and reports receipts. It
//! knows nothing about envelopes, fingerprints or imprints. Implementations may
//! talk to a REST gateway, a vendor SDK, or an in-process simulation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};

use imprint_core::{TopicId, TransactionId};

use crate::error::ClientError;

/// A signed topic message, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub topic_id: TopicId,
    pub transaction_id: TransactionId,
    pub payload: Vec<u8>,
    /// Operator signature over [`signing_bytes`].
    pub signature: Signature,
    pub public_key: VerifyingKey,
}

/// The service accepted the transaction; consensus may still be pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAck {
    pub transaction_id: TransactionId,
    pub accepted_at: DateTime<Utc>,
}

/// State of a transaction's receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success {
        sequence_number: u64,
        consensus_at: DateTime<Utc>,
    },
    /// Not yet reached consensus.
    Pending,
    Rejected(String),
}

/// Bytes the operator signs: the transaction id, a newline, then the payload.
///
/// Binding the transaction id stops a signed payload being replayed under a
/// different transaction.
pub fn signing_bytes(transaction_id: &TransactionId, payload: &[u8]) -> Vec<u8> {
    let id = transaction_id.to_string();
    let mut bytes = Vec::with_capacity(id.len() + 1 + payload.len());
    bytes.extend_from_slice(id.as_bytes());
    bytes.push(b'\n');
    bytes.extend_from_slice(payload);
    bytes
}

/// Client trait for the consensus service.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Deliver a message to its topic and wait for acknowledgment.
    async fn submit_message(&self, request: SubmitRequest) -> Result<SubmitAck, ClientError>;

    /// Look up the receipt of an earlier submission.
    async fn get_receipt(&self, transaction_id: &TransactionId)
        -> Result<ReceiptStatus, ClientError>;
}
