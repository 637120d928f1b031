//! # Imprint
//!
//! The unified API for Imprint: tamper-evident fingerprints for user content,
//! anchored on a public consensus ledger, with dispute-time verification.
//!
//! ## Overview
//!
//! - **Register**: canonicalize a content record, fingerprint it, persist both
//! - **Anchor**: submit the fingerprint to a ledger topic and track the attempt
//!   through `pending`, `submitted` and `confirmed` (or `failed`/`duplicate`)
//! - **Verify**: recompute a fingerprint from a record id or raw content and
//!   compare it with the persisted one
//! - **Reconcile**: finish or fail attempts left in flight
//!
//! ## Usage
//!
//! ```rust,no_run
//! use imprint::{Notary, NotaryConfig, VerifyRequest};
//! use imprint::ledger::{HttpLedgerClient, LedgerAdapter, LedgerConfig};
//! use imprint::store::SqliteStore;
//! use imprint::core::RecordId;
//!
//! async fn example() {
//!     let config = LedgerConfig::from_env().unwrap();
//!     let client = HttpLedgerClient::new(config.gateway_url.clone());
//!     let adapter = LedgerAdapter::new(client, &config);
//!
//!     let store = SqliteStore::open("imprint.db").unwrap();
//!     let notary = Notary::new(store, adapter, NotaryConfig::default());
//!
//!     let outcome = notary.anchor(&RecordId::new("post-1")).await.unwrap();
//!
//!     let verdict = notary
//!         .verifier()
//!         .verify(VerifyRequest::by_record_id("post-1"))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `imprint::core` - Canonical forms, fingerprints, the imprint state machine
//! - `imprint::store` - Storage abstraction and SQLite
//! - `imprint::ledger` - Ledger clients and the submission adapter

pub mod config;
pub mod error;
pub mod guard;
pub mod notary;
pub mod verifier;
pub mod worker;

// Re-export component crates
pub use imprint_core as core;
pub use imprint_ledger as ledger;
pub use imprint_store as store;

// Re-export main types for convenience
pub use config::NotaryConfig;
pub use error::{NotaryError, Result, VerifyError};
pub use guard::DuplicateGuard;
pub use notary::{AnchorOutcome, Notary, ReconcileReport, Registration, INTERRUPTED_REASON};
pub use verifier::{VerificationResult, VerificationStatus, Verifier, VerifyRequest};
pub use worker::{SubmissionQueue, WorkerStats};

// Re-export commonly used core types
pub use imprint_core::{
    canonicalize, fingerprint, fingerprint_record, ContentRecord, Fingerprint, Imprint,
    ImprintEvent, ImprintStatus, ProofDescriptor, RecordId,
};
