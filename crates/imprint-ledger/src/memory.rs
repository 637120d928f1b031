//! An in-process consensus service for testing.
//!
//! Keeps per-topic message logs with sequence numbers, checks operator
//! signatures against registered accounts, and lets tests inject failures and
//! latency.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Verifier, VerifyingKey};
use tokio::sync::Mutex;

use imprint_core::{AccountId, TopicId, TransactionId};

use crate::client::{signing_bytes, LedgerClient, ReceiptStatus, SubmitAck, SubmitRequest};
use crate::error::ClientError;

/// A message as recorded on a simulated topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub sequence_number: u64,
    pub transaction_id: TransactionId,
    pub payload: Vec<u8>,
    pub consensus_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, VerifyingKey>,
    topics: HashMap<TopicId, Vec<TopicMessage>>,

    /// Transaction -> (topic, sequence number).
    transactions: HashMap<TransactionId, (TopicId, u64)>,

    /// Transactions whose receipts report `Pending`.
    held: HashSet<TransactionId>,
    hold_receipts: bool,

    submit_failures: VecDeque<ClientError>,
    receipt_failures: VecDeque<ClientError>,
    latency: Option<Duration>,
}

/// Simulated consensus service. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `account` to submit, signing with `key`.
    pub async fn register_account(&self, account: AccountId, key: VerifyingKey) {
        self.state.lock().await.accounts.insert(account, key);
    }

    pub async fn create_topic(&self, topic: TopicId) {
        self.state.lock().await.topics.entry(topic).or_default();
    }

    /// Fail the next `submit_message` call with `error`.
    pub async fn fail_next_submit(&self, error: ClientError) {
        self.state.lock().await.submit_failures.push_back(error);
    }

    /// Fail the next `get_receipt` call with `error`.
    pub async fn fail_next_receipt(&self, error: ClientError) {
        self.state.lock().await.receipt_failures.push_back(error);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().await.latency = latency;
    }

    /// While set, receipts of newly accepted transactions stay `Pending`.
    pub async fn hold_receipts(&self, hold: bool) {
        self.state.lock().await.hold_receipts = hold;
    }

    /// Let consensus finish for every held transaction.
    pub async fn release_receipts(&self) {
        self.state.lock().await.held.clear();
    }

    /// Messages on a topic, in sequence order.
    pub async fn messages(&self, topic: &TopicId) -> Vec<TopicMessage> {
        self.state
            .lock()
            .await
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    async fn delay(&self) {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit_message(&self, request: SubmitRequest) -> Result<SubmitAck, ClientError> {
        self.delay().await;
        let mut state = self.state.lock().await;

        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }

        let payer = request.transaction_id.payer;
        match state.accounts.get(&payer) {
            Some(key) if *key == request.public_key => {}
            Some(_) => {
                return Err(ClientError::Unauthorized(format!(
                    "key does not belong to {}",
                    payer
                )))
            }
            None => return Err(ClientError::Unauthorized(format!("unknown account {}", payer))),
        }

        let message = signing_bytes(&request.transaction_id, &request.payload);
        if request.public_key.verify(&message, &request.signature).is_err() {
            return Err(ClientError::Unauthorized("invalid signature".into()));
        }

        if state.transactions.contains_key(&request.transaction_id) {
            return Err(ClientError::Rejected("DUPLICATE_TRANSACTION".into()));
        }

        let now = Utc::now();
        let log = state
            .topics
            .get_mut(&request.topic_id)
            .ok_or_else(|| ClientError::Rejected("INVALID_TOPIC_ID".into()))?;
        let sequence_number = log.len() as u64 + 1;
        log.push(TopicMessage {
            sequence_number,
            transaction_id: request.transaction_id,
            payload: request.payload,
            consensus_at: now,
        });

        state
            .transactions
            .insert(request.transaction_id, (request.topic_id, sequence_number));
        if state.hold_receipts {
            state.held.insert(request.transaction_id);
        }

        Ok(SubmitAck {
            transaction_id: request.transaction_id,
            accepted_at: now,
        })
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<ReceiptStatus, ClientError> {
        self.delay().await;
        let mut state = self.state.lock().await;

        if let Some(error) = state.receipt_failures.pop_front() {
            return Err(error);
        }

        let (topic, sequence_number) = *state
            .transactions
            .get(transaction_id)
            .ok_or_else(|| ClientError::NotFound(transaction_id.to_string()))?;

        if state.held.contains(transaction_id) {
            return Ok(ReceiptStatus::Pending);
        }

        let consensus_at = state
            .topics
            .get(&topic)
            .and_then(|log| log.get(sequence_number as usize - 1))
            .map(|m| m.consensus_at)
            .ok_or_else(|| ClientError::InvalidResponse("topic log is missing a message".into()))?;

        Ok(ReceiptStatus::Success {
            sequence_number,
            consensus_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::OperatorKey;
    use std::sync::atomic::{AtomicI64, Ordering};

    static NEXT_START: AtomicI64 = AtomicI64::new(0);

    fn request(key: &OperatorKey, payer: AccountId, topic: TopicId, payload: &[u8]) -> SubmitRequest {
        let offset = NEXT_START.fetch_add(1, Ordering::Relaxed);
        let transaction_id =
            TransactionId::generate(payer, Utc::now() + chrono::Duration::milliseconds(offset));
        SubmitRequest {
            topic_id: topic,
            transaction_id,
            payload: payload.to_vec(),
            signature: key.sign(&signing_bytes(&transaction_id, payload)),
            public_key: key.public_key(),
        }
    }

    async fn ledger_with(key: &OperatorKey) -> (MemoryLedger, AccountId, TopicId) {
        let ledger = MemoryLedger::new();
        let payer = AccountId::new(0, 0, 2);
        let topic = TopicId::new(0, 0, 100);
        ledger.register_account(payer, key.public_key()).await;
        ledger.create_topic(topic).await;
        (ledger, payer, topic)
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase_per_topic() {
        let key = OperatorKey::generate();
        let (ledger, payer, topic) = ledger_with(&key).await;

        let first = ledger
            .submit_message(request(&key, payer, topic, b"one"))
            .await
            .unwrap();
        let second = ledger
            .submit_message(request(&key, payer, topic, b"two"))
            .await
            .unwrap();

        let r1 = ledger.get_receipt(&first.transaction_id).await.unwrap();
        let r2 = ledger.get_receipt(&second.transaction_id).await.unwrap();
        assert!(matches!(r1, ReceiptStatus::Success { sequence_number: 1, .. }));
        assert!(matches!(r2, ReceiptStatus::Success { sequence_number: 2, .. }));

        let messages = ledger.messages(&topic).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].payload, b"two");
    }

    #[tokio::test]
    async fn test_rejects_unknown_account_and_bad_signature() {
        let key = OperatorKey::generate();
        let (ledger, payer, topic) = ledger_with(&key).await;

        let stranger = OperatorKey::generate();
        let err = ledger
            .submit_message(request(&stranger, payer, topic, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));

        let mut forged = request(&key, payer, topic, b"x");
        forged.payload = b"y".to_vec();
        let err = ledger.submit_message(forged).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));

        let err = ledger
            .submit_message(request(&key, AccountId::new(0, 0, 99), topic, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_topic_and_duplicate_transaction() {
        let key = OperatorKey::generate();
        let (ledger, payer, topic) = ledger_with(&key).await;

        let err = ledger
            .submit_message(request(&key, payer, TopicId::new(0, 0, 1), b"x"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Rejected("INVALID_TOPIC_ID".into()));

        let req = request(&key, payer, topic, b"x");
        ledger.submit_message(req.clone()).await.unwrap();
        let err = ledger.submit_message(req).await.unwrap_err();
        assert_eq!(err, ClientError::Rejected("DUPLICATE_TRANSACTION".into()));
    }

    #[tokio::test]
    async fn test_held_receipts_and_injected_failures() {
        let key = OperatorKey::generate();
        let (ledger, payer, topic) = ledger_with(&key).await;

        ledger.hold_receipts(true).await;
        let ack = ledger
            .submit_message(request(&key, payer, topic, b"x"))
            .await
            .unwrap();
        assert_eq!(
            ledger.get_receipt(&ack.transaction_id).await.unwrap(),
            ReceiptStatus::Pending
        );

        ledger.release_receipts().await;
        ledger
            .fail_next_receipt(ClientError::Transport("reset".into()))
            .await;
        assert!(ledger.get_receipt(&ack.transaction_id).await.is_err());
        assert!(matches!(
            ledger.get_receipt(&ack.transaction_id).await.unwrap(),
            ReceiptStatus::Success { .. }
        ));

        ledger
            .fail_next_submit(ClientError::Transport("down".into()))
            .await;
        assert!(ledger
            .submit_message(request(&key, payer, topic, b"y"))
            .await
            .is_err());
    }
}
