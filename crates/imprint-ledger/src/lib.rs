//! # Imprint Ledger
//!
//! The boundary between Imprint and the public consensus service.
//!
//! ## Overview
//!
//! - [`LedgerClient`] - Vendor boundary: deliver a signed message, fetch a receipt
//! - [`HttpLedgerClient`] - JSON submission gateway client (reqwest)
//! - [`MemoryLedger`] - In-process simulated consensus service for tests
//! - [`LedgerAdapter`] - Signing, timeouts, serialization and error normalization
//! - [`LedgerConfig`] - Operator account, key, topic and explorer settings
//!
//! ## Failure Model
//!
//! Every client failure is normalized into one of two kinds:
//!
//! - [`LedgerError::Config`] - missing or refused credentials; fatal
//! - [`LedgerError::Submission`] - timeout, network, rejection, missing receipt; retryable

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod operator;

pub use adapter::{explorer_url, LedgerAdapter};
pub use client::{signing_bytes, LedgerClient, ReceiptStatus, SubmitAck, SubmitRequest};
pub use config::LedgerConfig;
pub use error::{ClientError, LedgerError, Result, SubmissionFailure};
pub use http::HttpLedgerClient;
pub use memory::{MemoryLedger, TopicMessage};
pub use operator::{OperatorCredentials, OperatorKey, DER_PREFIX};
