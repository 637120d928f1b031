//! The message submitted to the ledger topic.
//!
//! Wire format (compact UTF-8 JSON, keys in this order):
//!
//! ```text
//! {"v":1,"t":<epoch_ms>,"pid":<recordId>,"aid":<authorId>,"h":<fingerprint_hex>,"at":<iso8601>}
//! ```
//!
//! `t` is the submission time; `at` is the record's canonical creation
//! timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalForm;
use crate::error::CoreError;
use crate::fingerprint::Fingerprint;

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEnvelope {
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
    #[serde(rename = "pid")]
    pub record_id: String,
    #[serde(rename = "aid")]
    pub author_id: String,
    #[serde(rename = "h")]
    pub fingerprint: Fingerprint,
    #[serde(rename = "at")]
    pub iso_timestamp: String,
}

impl LedgerEnvelope {
    /// Build the envelope for a canonical form and its fingerprint.
    pub fn new(canonical: &CanonicalForm, fingerprint: Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            timestamp_ms: now.timestamp_millis(),
            record_id: canonical.record_id.clone(),
            author_id: canonical.author_id.clone(),
            fingerprint,
            iso_timestamp: canonical.timestamp.clone(),
        }
    }

    /// Compact JSON payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Parse a payload read back from the ledger.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, CoreError> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(CoreError::EncodingError(format!(
                "unsupported envelope version: {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }
}
