//! # Imprint Store
//!
//! Storage abstraction for Imprint. Provides a trait-based interface for
//! content records, imprint attempts and fingerprint claims, with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait, allowing
//! the notary and verifier to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of registering a record
//! - [`BeginOutcome`] - Result of the atomic claim-and-persist step
//! - [`SaveOutcome`] - Result of a compare-and-set imprint write
//!
//! ## Usage
//!
//! ```rust,no_run
//! use imprint_store::{SqliteStore, Store};
//! use imprint_core::{fingerprint_record, ContentRecord};
//!
//! async fn example(record: ContentRecord) {
//!     let store = SqliteStore::open("imprint.db").unwrap();
//!     let fp = fingerprint_record(&record).unwrap();
//!     store.insert_record(&record, &fp, chrono::Utc::now()).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Registering the same record id twice returns `AlreadyExists`
//! - **Fixed fingerprints**: Editing a record never rewrites its registered fingerprint
//! - **Append-only attempts**: A retry adds a new imprint row; failed attempts stay
//! - **Atomic claims**: `begin_attempt` checks and claims a fingerprint in one step
//! - **Compare-and-set transitions**: `save_imprint` never overwrites a row that moved on

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    BeginOutcome, Claim, InsertResult, ProofRetention, SaveOutcome, Store, StoredRecord,
};
