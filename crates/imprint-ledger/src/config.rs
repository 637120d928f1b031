//! Ledger configuration.
//!
//! Nothing here is validated at load time. Missing or malformed operator
//! settings surface as [`LedgerError::Config`] when a submission is attempted,
//! so canonicalization and verification keep working without credentials.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use imprint_core::{AccountId, TopicId};

use crate::error::LedgerError;
use crate::operator::{OperatorCredentials, OperatorKey};

/// Environment variable names read by [`LedgerConfig::from_env`].
pub mod env {
    pub const NETWORK: &str = "IMPRINT_NETWORK";
    pub const GATEWAY_URL: &str = "IMPRINT_GATEWAY_URL";
    pub const TOPIC_ID: &str = "IMPRINT_TOPIC_ID";
    pub const OPERATOR_ID: &str = "IMPRINT_OPERATOR_ID";
    pub const OPERATOR_KEY: &str = "IMPRINT_OPERATOR_KEY";
    pub const SUBMIT_TIMEOUT_MS: &str = "IMPRINT_SUBMIT_TIMEOUT_MS";
    pub const EXPLORER_BASE: &str = "IMPRINT_EXPLORER_BASE";
}

/// Configuration for the ledger adapter.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Network name, e.g. `testnet` or `mainnet`.
    pub network: String,

    /// Base URL of the submission gateway.
    pub gateway_url: String,

    /// Topic every envelope is submitted to.
    pub topic_id: Option<String>,

    /// Operator account paying for submissions.
    pub operator_id: Option<String>,

    /// Operator Ed25519 key, raw or DER hex.
    pub operator_key: Option<String>,

    /// Per-call timeout for submissions and receipt queries.
    pub submit_timeout_ms: u64,

    /// Explorer base URL. Derived from `network` when unset.
    pub explorer_base: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: "testnet".into(),
            gateway_url: "http://127.0.0.1:5600".into(),
            topic_id: None,
            operator_id: None,
            operator_key: None,
            submit_timeout_ms: 10_000,
            explorer_base: None,
        }
    }
}

impl LedgerConfig {
    /// Load from `IMPRINT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, LedgerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source over the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LedgerError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(network) = get(env::NETWORK) {
            config.network = network;
        }
        if let Some(url) = get(env::GATEWAY_URL) {
            config.gateway_url = url;
        }
        config.topic_id = get(env::TOPIC_ID);
        config.operator_id = get(env::OPERATOR_ID);
        config.operator_key = get(env::OPERATOR_KEY);
        config.explorer_base = get(env::EXPLORER_BASE);

        if let Some(ms) = get(env::SUBMIT_TIMEOUT_MS) {
            config.submit_timeout_ms = ms.trim().parse().map_err(|_| {
                LedgerError::Config(format!("{} must be a number of milliseconds", env::SUBMIT_TIMEOUT_MS))
            })?;
        }

        Ok(config)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Explorer base without a trailing slash.
    pub fn explorer_base(&self) -> String {
        match &self.explorer_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://hashscan.io/{}", self.network),
        }
    }

    /// Parse the topic id.
    pub fn topic(&self) -> Result<TopicId, LedgerError> {
        let raw = self
            .topic_id
            .as_deref()
            .ok_or_else(|| LedgerError::Config(format!("{} is not set", env::TOPIC_ID)))?;
        raw.parse()
            .map_err(|e| LedgerError::Config(format!("{}: {}", env::TOPIC_ID, e)))
    }

    /// Parse the operator account and key.
    pub fn credentials(&self) -> Result<OperatorCredentials, LedgerError> {
        let id = self
            .operator_id
            .as_deref()
            .ok_or_else(|| LedgerError::Config(format!("{} is not set", env::OPERATOR_ID)))?;
        let key = self
            .operator_key
            .as_deref()
            .ok_or_else(|| LedgerError::Config(format!("{} is not set", env::OPERATOR_KEY)))?;

        let account_id: AccountId = id
            .parse()
            .map_err(|e| LedgerError::Config(format!("{}: {}", env::OPERATOR_ID, e)))?;

        Ok(OperatorCredentials {
            account_id,
            key: OperatorKey::parse(key)?,
        })
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("network", &self.network)
            .field("gateway_url", &self.gateway_url)
            .field("topic_id", &self.topic_id)
            .field("operator_id", &self.operator_id)
            .field(
                "operator_key",
                &self.operator_key.as_ref().map(|_| "<redacted>"),
            )
            .field("submit_timeout_ms", &self.submit_timeout_ms)
            .field("explorer_base", &self.explorer_base)
            .finish()
    }
}
