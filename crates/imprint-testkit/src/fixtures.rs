//! Test fixtures and helpers.
//!
//! Content records with known fingerprints, and a simulated ledger with a
//! registered operator and topic.

use chrono::{DateTime, TimeZone, Utc};

use imprint_core::{AccountId, ContentRecord, TopicId};
use imprint_ledger::{LedgerAdapter, LedgerConfig, MemoryLedger, OperatorKey};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(y, mo, d, h, mi, s)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH);
    base + chrono::Duration::milliseconds(i64::from(ms))
}

/// `post-1`: an image post with padded body and unsorted tags.
pub fn hello_world_record() -> ContentRecord {
    ContentRecord::new(
        "post-1",
        "user-42",
        "  Hello world!  ",
        utc(2024, 1, 1, 0, 0, 0, 0),
    )
    .with_tags(["tech", "blockchain", "ai"])
    .with_image("https://cdn.example/img/1.png")
}

/// `post-2`: text only, with characters that need JSON escaping.
pub fn text_record() -> ContentRecord {
    ContentRecord::new(
        "post-2",
        "user-7",
        "line one\n\tline two \"quoted\"",
        utc(2023, 6, 15, 12, 30, 45, 123),
    )
}

/// `post-3`: mixed media, non-ASCII body, a control character, mixed-case and
/// repeated tags.
pub fn mixed_record() -> ContentRecord {
    ContentRecord::new(
        "post-3",
        "user-9",
        "café ☕ \u{0001}",
        utc(2024, 2, 29, 23, 59, 59, 999),
    )
    .with_tags(["alpha", "Zeta", "alpha"])
    .with_primary_image("https://cdn.example/img/cover.jpg")
    .with_image("https://cdn.example/img/2.jpg")
    .with_video("https://cdn.example/vid/1.mp4")
}

/// A numbered text record, for tests that need many distinct records.
pub fn numbered_record(n: usize) -> ContentRecord {
    ContentRecord::new(
        format!("post-{}", 1000 + n),
        "user-1",
        format!("post number {}", n),
        utc(2024, 1, 1, 0, 0, 0, 0) + chrono::Duration::seconds(n as i64),
    )
}

/// A simulated ledger with one funded operator and one topic.
pub struct LedgerFixture {
    pub ledger: MemoryLedger,
    pub operator_id: AccountId,
    pub operator_key: OperatorKey,
    pub topic_id: TopicId,
}

impl LedgerFixture {
    pub const OPERATOR: AccountId = AccountId::new(0, 0, 1001);
    pub const TOPIC: TopicId = TopicId::new(0, 0, 5005);

    /// Create the ledger and register the operator and topic on it.
    pub async fn new() -> Self {
        Self::with_seed([0x42; 32]).await
    }

    pub async fn with_seed(seed: [u8; 32]) -> Self {
        let ledger = MemoryLedger::new();
        let operator_key = OperatorKey::from_seed(&seed);
        ledger
            .register_account(Self::OPERATOR, operator_key.public_key())
            .await;
        ledger.create_topic(Self::TOPIC).await;

        Self {
            ledger,
            operator_id: Self::OPERATOR,
            operator_key,
            topic_id: Self::TOPIC,
        }
    }

    /// Configuration pointing at the registered operator and topic.
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig {
            topic_id: Some(self.topic_id.to_string()),
            operator_id: Some(self.operator_id.to_string()),
            operator_key: Some(self.operator_key.to_hex()),
            submit_timeout_ms: 2_000,
            ..LedgerConfig::default()
        }
    }

    /// An adapter over a handle to this ledger.
    pub fn adapter(&self) -> LedgerAdapter<MemoryLedger> {
        LedgerAdapter::new(self.ledger.clone(), &self.config())
    }

    /// An adapter over this ledger built from `config`.
    pub fn adapter_with(&self, config: &LedgerConfig) -> LedgerAdapter<MemoryLedger> {
        LedgerAdapter::new(self.ledger.clone(), config)
    }

    /// An adapter with no operator credentials at all.
    pub fn unconfigured_adapter(&self) -> LedgerAdapter<MemoryLedger> {
        LedgerAdapter::new(self.ledger.clone(), &LedgerConfig::default())
    }
}
