//! The ledger adapter: the only component with network I/O and credentials.
//!
//! Wraps a [`LedgerClient`] with operator signing, per-operator serialization,
//! explicit timeouts and error normalization. Nothing vendor-specific leaves
//! this module: callers see [`ProofDescriptor`] or [`LedgerError`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use imprint_core::{LedgerEnvelope, ProofDescriptor, TopicId, TransactionId};

use crate::client::{signing_bytes, LedgerClient, ReceiptStatus, SubmitRequest};
use crate::config::LedgerConfig;
use crate::error::{ClientError, LedgerError, Result, SubmissionFailure};
use crate::operator::OperatorCredentials;

/// Resolved operator settings.
#[derive(Debug, Clone)]
struct Operator {
    credentials: OperatorCredentials,
    topic_id: TopicId,
}

/// Submits envelopes and queries receipts on behalf of one operator.
pub struct LedgerAdapter<C: LedgerClient> {
    client: C,
    operator: std::result::Result<Operator, LedgerError>,
    explorer_base: String,
    timeout: Duration,

    /// Held for the whole of a submission. Stores the last valid-start time
    /// so transaction ids from this operator never collide.
    submit_lock: Mutex<Option<DateTime<Utc>>>,
}

impl<C: LedgerClient> LedgerAdapter<C> {
    /// Build an adapter. Configuration problems are kept and reported by
    /// [`submit`](Self::submit), not here.
    pub fn new(client: C, config: &LedgerConfig) -> Self {
        let operator = config.credentials().and_then(|credentials| {
            Ok(Operator {
                credentials,
                topic_id: config.topic()?,
            })
        });

        if let Err(e) = &operator {
            debug!(error = %e, "ledger adapter has no usable operator");
        }

        Self {
            client,
            operator,
            explorer_base: config.explorer_base(),
            timeout: config.submit_timeout(),
            submit_lock: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// `Ok` if submissions can be attempted.
    pub fn ensure_configured(&self) -> Result<()> {
        self.operator().map(|_| ())
    }

    pub fn topic_id(&self) -> Option<TopicId> {
        self.operator.as_ref().ok().map(|op| op.topic_id)
    }

    pub fn explorer_base(&self) -> &str {
        &self.explorer_base
    }

    /// Human-auditable link to a transaction. Informational only.
    pub fn explorer_url(&self, transaction_id: &TransactionId) -> String {
        explorer_url(&self.explorer_base, transaction_id)
    }

    fn operator(&self) -> Result<&Operator> {
        self.operator.as_ref().map_err(Clone::clone)
    }

    /// Submit an envelope and wait for acknowledgment.
    ///
    /// The returned proof has no sequence number yet; see
    /// [`query_receipt`](Self::query_receipt).
    pub async fn submit(&self, envelope: &LedgerEnvelope) -> Result<ProofDescriptor> {
        let operator = self.operator()?;
        let mut last_start = self.submit_lock.lock().await;

        let mut valid_start = Utc::now();
        if let Some(last) = *last_start {
            if valid_start <= last {
                valid_start = last + chrono::Duration::nanoseconds(1);
            }
        }
        *last_start = Some(valid_start);

        let transaction_id =
            TransactionId::generate(operator.credentials.account_id, valid_start);
        let payload = envelope
            .to_payload()
            .map_err(|e| LedgerError::Encoding(e.to_string()))?;
        let signature = operator
            .credentials
            .key
            .sign(&signing_bytes(&transaction_id, &payload));

        let request = SubmitRequest {
            topic_id: operator.topic_id,
            transaction_id,
            payload,
            signature,
            public_key: operator.credentials.key.public_key(),
        };

        debug!(
            record_id = %envelope.record_id,
            fingerprint = %envelope.fingerprint,
            transaction_id = %transaction_id,
            topic_id = %operator.topic_id,
            "submitting envelope"
        );

        let ack = tokio::time::timeout(self.timeout, self.client.submit_message(request))
            .await
            .map_err(|_| SubmissionFailure::Timeout(self.timeout))?
            .map_err(normalize_submit_error)?;

        if ack.transaction_id != transaction_id {
            warn!(
                expected = %transaction_id,
                got = %ack.transaction_id,
                "ledger acknowledged a different transaction"
            );
            return Err(SubmissionFailure::Network(format!(
                "acknowledged transaction {} instead of {}",
                ack.transaction_id, transaction_id
            ))
            .into());
        }

        Ok(ProofDescriptor {
            topic_id: operator.topic_id,
            sequence_number: None,
            transaction_id,
            submitted_at: ack.accepted_at,
        })
    }

    /// Fetch the receipt for a submitted proof and complete it.
    pub async fn query_receipt(&self, submitted: &ProofDescriptor) -> Result<ProofDescriptor> {
        let transaction_id = submitted.transaction_id;

        let status = tokio::time::timeout(self.timeout, self.client.get_receipt(&transaction_id))
            .await
            .map_err(|_| SubmissionFailure::Timeout(self.timeout))?
            .map_err(normalize_receipt_error)?;

        match status {
            ReceiptStatus::Success {
                sequence_number, ..
            } => {
                debug!(
                    transaction_id = %transaction_id,
                    sequence_number,
                    "receipt obtained"
                );
                Ok(ProofDescriptor {
                    sequence_number: Some(sequence_number),
                    ..submitted.clone()
                })
            }
            ReceiptStatus::Pending => Err(SubmissionFailure::ReceiptUnavailable(
                "consensus not yet reached".into(),
            )
            .into()),
            ReceiptStatus::Rejected(reason) => Err(SubmissionFailure::Rejected(reason).into()),
        }
    }
}

/// `<explorer_base>/transaction/<transaction id>`.
pub fn explorer_url(explorer_base: &str, transaction_id: &TransactionId) -> String {
    format!("{}/transaction/{}", explorer_base, transaction_id)
}

/// Normalize a client error raised while submitting.
fn normalize_submit_error(e: ClientError) -> LedgerError {
    match e {
        ClientError::Unauthorized(msg) => {
            LedgerError::Config(format!("operator credentials refused: {}", msg))
        }
        ClientError::Transport(msg) => SubmissionFailure::Network(msg).into(),
        ClientError::Rejected(msg) | ClientError::NotFound(msg) => {
            SubmissionFailure::Rejected(msg).into()
        }
        ClientError::InvalidResponse(msg) => {
            SubmissionFailure::Network(format!("invalid response: {}", msg)).into()
        }
    }
}

/// Normalize a client error raised while querying a receipt.
fn normalize_receipt_error(e: ClientError) -> LedgerError {
    match e {
        ClientError::NotFound(msg) => SubmissionFailure::ReceiptUnavailable(msg).into(),
        ClientError::Rejected(msg) => SubmissionFailure::Rejected(msg).into(),
        ClientError::Unauthorized(msg) | ClientError::Transport(msg) => {
            SubmissionFailure::Network(msg).into()
        }
        ClientError::InvalidResponse(msg) => {
            SubmissionFailure::Network(format!("invalid response: {}", msg)).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use imprint_core::{canonicalize, fingerprint, AccountId, ContentRecord};

    use crate::memory::MemoryLedger;
    use crate::operator::OperatorKey;

    const TOPIC: TopicId = TopicId::new(0, 0, 4821);
    const PAYER: AccountId = AccountId::new(0, 0, 1001);

    fn envelope() -> LedgerEnvelope {
        let record = ContentRecord::new(
            "post-1",
            "user-42",
            "hello",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let canonical = canonicalize(&record).unwrap();
        LedgerEnvelope::new(&canonical, fingerprint(&canonical).unwrap(), Utc::now())
    }

    fn config(key: &OperatorKey) -> LedgerConfig {
        LedgerConfig {
            topic_id: Some(TOPIC.to_string()),
            operator_id: Some(PAYER.to_string()),
            operator_key: Some(key.to_hex()),
            submit_timeout_ms: 200,
            ..Default::default()
        }
    }

    async fn setup() -> (LedgerAdapter<MemoryLedger>, MemoryLedger) {
        let key = OperatorKey::generate();
        let ledger = MemoryLedger::new();
        ledger.register_account(PAYER, key.public_key()).await;
        ledger.create_topic(TOPIC).await;
        (LedgerAdapter::new(ledger.clone(), &config(&key)), ledger)
    }

    #[tokio::test]
    async fn test_submit_then_receipt() {
        let (adapter, ledger) = setup().await;
        let env = envelope();

        let partial = adapter.submit(&env).await.unwrap();
        assert_eq!(partial.topic_id, TOPIC);
        assert_eq!(partial.sequence_number, None);
        assert_eq!(partial.transaction_id.payer, PAYER);

        let full = adapter.query_receipt(&partial).await.unwrap();
        assert_eq!(full.sequence_number, Some(1));
        assert_eq!(full.transaction_id, partial.transaction_id);

        let messages = ledger.messages(&TOPIC).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(
            LedgerEnvelope::from_payload(&messages[0].payload).unwrap(),
            env
        );
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique() {
        let (adapter, _ledger) = setup().await;
        let env = envelope();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let proof = adapter.submit(&env).await.unwrap();
            assert!(seen.insert(proof.transaction_id));
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let adapter = LedgerAdapter::new(MemoryLedger::new(), &LedgerConfig::default());
        assert!(matches!(adapter.ensure_configured(), Err(LedgerError::Config(_))));
        assert!(adapter.topic_id().is_none());

        let err = adapter.submit(&envelope()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unregistered_operator_is_config_error() {
        let ledger = MemoryLedger::new();
        ledger.create_topic(TOPIC).await;
        let adapter = LedgerAdapter::new(ledger, &config(&OperatorKey::generate()));

        let err = adapter.submit(&envelope()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_submission_error() {
        let (adapter, ledger) = setup().await;
        ledger.set_latency(Some(Duration::from_secs(5))).await;

        let err = adapter.submit(&envelope()).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::Submission(SubmissionFailure::Timeout(Duration::from_millis(200)))
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_receipt_failures_are_normalized() {
        let (adapter, ledger) = setup().await;
        ledger.hold_receipts(true).await;
        let partial = adapter.submit(&envelope()).await.unwrap();

        let err = adapter.query_receipt(&partial).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Submission(SubmissionFailure::ReceiptUnavailable(_))
        ));

        ledger
            .fail_next_receipt(ClientError::Transport("connection reset".into()))
            .await;
        let err = adapter.query_receipt(&partial).await.unwrap_err();
        assert!(matches!(err, LedgerError::Submission(SubmissionFailure::Network(_))));
    }

    #[test]
    fn test_error_normalization() {
        assert!(matches!(
            normalize_submit_error(ClientError::Unauthorized("x".into())),
            LedgerError::Config(_)
        ));
        assert_eq!(
            normalize_submit_error(ClientError::Rejected("INVALID_TOPIC_ID".into())),
            LedgerError::Submission(SubmissionFailure::Rejected("INVALID_TOPIC_ID".into()))
        );
        assert!(matches!(
            normalize_receipt_error(ClientError::NotFound("tx".into())),
            LedgerError::Submission(SubmissionFailure::ReceiptUnavailable(_))
        ));
    }

    #[test]
    fn test_explorer_url() {
        let adapter = LedgerAdapter::new(
            MemoryLedger::new(),
            &LedgerConfig {
                network: "mainnet".into(),
                ..Default::default()
            },
        );
        let tx = TransactionId::generate(PAYER, Utc.timestamp_opt(1_704_067_200, 0).unwrap());
        assert_eq!(
            adapter.explorer_url(&tx),
            "https://hashscan.io/mainnet/transaction/0.0.1001@1704067200.000000000"
        );
    }
}
