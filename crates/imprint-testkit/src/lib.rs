//! # Imprint Testkit
//!
//! Testing utilities for Imprint.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Records with their expected canonical strings and fingerprints
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Known records and a simulated ledger with a registered operator
//!
//! ## Golden Vectors
//!
//! ```rust
//! use imprint_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use imprint_testkit::generators::{record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn fingerprint_is_deterministic(params: RecordParams) {
//!         let record = record_from_params(&params);
//!         prop_assert_eq!(
//!             imprint_core::fingerprint_record(&record).unwrap(),
//!             imprint_core::fingerprint_record(&record).unwrap()
//!         );
//!     }
//! }
//! ```
//!
//! ## Ledger Fixture
//!
//! ```rust,ignore
//! use imprint_testkit::fixtures::LedgerFixture;
//!
//! let fixture = LedgerFixture::new().await;
//! let adapter = fixture.adapter();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{hello_world_record, mixed_record, text_record, LedgerFixture};
pub use generators::{record_from_params, RecordParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
