//! # Imprint Core
//!
//! Pure primitives for Imprint: canonical content forms, fingerprints, and the
//! imprint lifecycle state machine.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is a
//! deterministic function of its inputs.
//!
//! ## Key Types
//!
//! - [`ContentRecord`] - The minimal projection of a post this crate reads
//! - [`CanonicalForm`] - The byte-stable serialization used as hash input
//! - [`Fingerprint`] - SHA-256 of the canonical form (64 lowercase hex chars)
//! - [`Imprint`] - One attempt at anchoring a record on the ledger
//! - [`ProofDescriptor`] - Topic, sequence number, transaction id, submission time
//!
//! ## Canonicalization
//!
//! Field order of the canonical JSON object is fixed. See [`canonical`] module.

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod imprint;
pub mod ledger_ids;
pub mod record;

pub use canonical::{canonicalize, CanonicalForm, CanonicalMetadata, ContentType};
pub use envelope::{LedgerEnvelope, ENVELOPE_VERSION};
pub use error::{CoreError, TransitionError, ValidationError};
pub use fingerprint::{fingerprint, fingerprint_record, Fingerprint};
pub use imprint::{Imprint, ImprintEvent, ImprintStatus, ProofDescriptor, Transition};
pub use ledger_ids::{AccountId, TopicId, TransactionId};
pub use record::{AuthorId, ContentRecord, RecordId};
