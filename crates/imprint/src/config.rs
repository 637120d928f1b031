//! Notary configuration.

use std::time::Duration;

/// Configuration for the [`Notary`](crate::Notary).
#[derive(Debug, Clone)]
pub struct NotaryConfig {
    /// A `pending` imprint older than this was interrupted before the ledger
    /// acknowledged it. Reconciliation fails it.
    pub stale_after: Duration,

    /// A `submitted` imprint whose receipt is still unavailable after this
    /// long is failed by reconciliation.
    pub receipt_deadline: Duration,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            receipt_deadline: Duration::from_secs(60 * 60),
        }
    }
}
