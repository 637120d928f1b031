//! End-to-end anchoring against the in-memory store and ledger.

use std::time::Duration;

use chrono::Utc;

use imprint::core::{ImprintEvent, LedgerEnvelope, RecordId, TransitionError};
use imprint::ledger::{LedgerConfig, LedgerError, MemoryLedger};
use imprint::store::{MemoryStore, Store};
use imprint::{
    AnchorOutcome, ImprintStatus, Notary, NotaryConfig, NotaryError, SubmissionQueue,
    VerificationStatus, VerifyRequest,
};
use imprint_testkit::fixtures::{self, LedgerFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn setup() -> (LedgerFixture, Notary<MemoryStore, MemoryLedger>) {
    init_tracing();
    let fixture = LedgerFixture::new().await;
    let notary = Notary::new(MemoryStore::new(), fixture.adapter(), NotaryConfig::default());
    (fixture, notary)
}

#[tokio::test]
async fn test_anchor_then_verify() {
    let (fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();

    let registration = notary.register(&record).await.unwrap();
    assert!(registration.inserted);
    assert_eq!(
        registration.fingerprint.to_hex(),
        "8e1a0c374036cdceefd65ef2192d644bb519ab62e46cfb6663bcae0e0fe41d1f"
    );

    let outcome = notary.anchor(&record.id).await.unwrap();
    let AnchorOutcome::Confirmed(imprint) = outcome else {
        panic!("expected confirmed, got {:?}", outcome)
    };
    assert_eq!(imprint.attempt, 1);
    let proof = imprint.proof.clone().unwrap();
    assert_eq!(proof.topic_id, LedgerFixture::TOPIC);
    assert_eq!(proof.sequence_number, Some(1));

    // the envelope on the topic carries the registered fingerprint
    let messages = fixture.ledger.messages(&fixture.topic_id).await;
    assert_eq!(messages.len(), 1);
    let envelope = LedgerEnvelope::from_payload(&messages[0].payload).unwrap();
    assert_eq!(envelope.fingerprint, registration.fingerprint);
    assert_eq!(envelope.record_id, "post-1");

    let result = notary
        .verifier()
        .verify(VerifyRequest::by_record_id("post-1"))
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(result.imprint_status, Some(ImprintStatus::Confirmed));
    assert_eq!(result.proof, Some(proof.clone()));
    let url = result.explorer_url.unwrap();
    assert!(url.starts_with("https://hashscan.io/testnet/transaction/"));
    assert!(url.ends_with(&proof.transaction_id.to_string()));
}

#[tokio::test]
async fn test_register_twice_keeps_first_fingerprint() {
    let (_fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();

    let first = notary.register(&record).await.unwrap();
    let mut edited = record.clone();
    edited.body = "Different content".into();
    let second = notary.register(&edited).await.unwrap();

    assert!(!second.inserted);
    assert_eq!(second.fingerprint, first.fingerprint);
}

#[tokio::test]
async fn test_tampered_record_is_detected() {
    let (_fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();
    notary.anchor(&record.id).await.unwrap();

    let mut edited = record.clone();
    edited.body = "Hello world, edited".into();
    notary.store().update_record(&edited).await.unwrap();

    let result = notary
        .verifier()
        .verify(VerifyRequest::by_record_id("post-1"))
        .await
        .unwrap();
    assert!(!result.matched);
    assert_eq!(result.status, VerificationStatus::Mismatch);
    assert!(result.proof.is_some());
    assert_ne!(result.computed_fingerprint, result.stored_fingerprint);

    // the original content still verifies
    let original = notary
        .verifier()
        .verify(VerifyRequest::by_content(record.clone()))
        .await
        .unwrap();
    assert!(original.matched);

    match notary.anchor(&record.id).await {
        Err(NotaryError::FingerprintChanged { record_id, .. }) => assert_eq!(record_id, record.id),
        other => panic!("expected fingerprint change, got {:?}", other),
    }
}

#[tokio::test]
async fn test_final_imprints_ignore_events() {
    let (fixture, notary) = setup().await;
    let record = fixtures::text_record();
    notary.register(&record).await.unwrap();
    let confirmed = notary.anchor(&record.id).await.unwrap().into_imprint();
    assert_eq!(confirmed.status, ImprintStatus::Confirmed);

    let after = notary
        .advance(&record.id, ImprintEvent::SubmissionFailed("late failure".into()))
        .await
        .unwrap();
    assert_eq!(after, confirmed);
    assert_eq!(notary.current_imprint(&record.id).await.unwrap(), confirmed);

    match notary.anchor(&record.id).await.unwrap() {
        AnchorOutcome::AlreadyFinal(imprint) => assert_eq!(imprint, confirmed),
        other => panic!("expected already final, got {:?}", other),
    }
    assert_eq!(notary.request_submission(&record.id).await.unwrap(), confirmed);
    assert_eq!(fixture.ledger.messages(&fixture.topic_id).await.len(), 1);
}

#[tokio::test]
async fn test_manual_lifecycle_with_advance() {
    let (_fixture, notary) = setup().await;
    let record = fixtures::mixed_record();
    notary.register(&record).await.unwrap();

    let pending = notary.request_submission(&record.id).await.unwrap();
    assert_eq!(pending.status, ImprintStatus::Pending);

    // the pipeline does not start a second submission behind a pending one
    assert!(matches!(
        notary.anchor(&record.id).await.unwrap(),
        AnchorOutcome::InFlight(_)
    ));

    let partial = sample_proof();
    let full = imprint::ProofDescriptor {
        sequence_number: Some(7),
        ..partial.clone()
    };

    let err = notary
        .advance(&record.id, ImprintEvent::ReceiptObtained(full.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, NotaryError::Transition(TransitionError::Invalid { .. })));

    let submitted = notary
        .advance(&record.id, ImprintEvent::SubmitAccepted(partial))
        .await
        .unwrap();
    assert_eq!(submitted.status, ImprintStatus::Submitted);

    let confirmed = notary
        .advance(&record.id, ImprintEvent::ReceiptObtained(full))
        .await
        .unwrap();
    assert_eq!(confirmed.status, ImprintStatus::Confirmed);
    assert_eq!(confirmed.proof.unwrap().sequence_number, Some(7));
}

#[tokio::test]
async fn test_timeout_fails_attempt_and_retry_succeeds() {
    init_tracing();
    let fixture = LedgerFixture::new().await;
    let config = LedgerConfig {
        submit_timeout_ms: 100,
        ..fixture.config()
    };
    let notary = Notary::new(
        MemoryStore::new(),
        fixture.adapter_with(&config),
        NotaryConfig::default(),
    );
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();

    fixture.ledger.set_latency(Some(Duration::from_secs(1))).await;
    let outcome = notary.anchor(&record.id).await.unwrap();
    let AnchorOutcome::Failed(failed) = outcome else {
        panic!("expected failure, got {:?}", outcome)
    };
    assert_eq!(failed.attempt, 1);
    assert!(failed.proof.is_none());
    assert!(failed.failure_reason.unwrap().contains("timed out"));

    fixture.ledger.set_latency(None).await;
    let outcome = notary.anchor(&record.id).await.unwrap();
    let AnchorOutcome::Confirmed(confirmed) = outcome else {
        panic!("expected confirmed, got {:?}", outcome)
    };
    assert_eq!(confirmed.attempt, 2);

    let history = notary.history(&record.id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|i| i.status).collect();
    assert_eq!(statuses, vec![ImprintStatus::Failed, ImprintStatus::Confirmed]);
}

#[tokio::test]
async fn test_missing_credentials_fail_submission_only() {
    init_tracing();
    let fixture = LedgerFixture::new().await;
    let notary = Notary::new(
        MemoryStore::new(),
        fixture.unconfigured_adapter(),
        NotaryConfig::default(),
    );
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();

    match notary.anchor(&record.id).await {
        Err(NotaryError::Ledger(LedgerError::Config(_))) => {}
        other => panic!("expected configuration error, got {:?}", other),
    }
    assert!(matches!(
        notary.request_submission(&record.id).await,
        Err(NotaryError::Ledger(LedgerError::Config(_)))
    ));

    // nothing moved
    let current = notary.current_imprint(&record.id).await.unwrap();
    assert_eq!(current.status, ImprintStatus::None);

    let result = notary
        .verifier()
        .verify(VerifyRequest::by_record_id("post-1"))
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.proof, None);
}

#[tokio::test]
async fn test_retry_after_receipt_deadline_is_duplicate() {
    let (fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();

    fixture.ledger.hold_receipts(true).await;
    let submitted = notary.anchor(&record.id).await.unwrap().into_imprint();
    assert_eq!(submitted.status, ImprintStatus::Submitted);
    let partial = submitted.proof.clone().unwrap();

    // no receipt within the deadline: the attempt fails, but the message may
    // still be on its way through consensus
    let later = Utc::now() + chrono::Duration::seconds(3601);
    assert_eq!(notary.reconcile(later).await.unwrap().failed, 1);
    let failed = notary.current_imprint(&record.id).await.unwrap();
    assert_eq!(failed.status, ImprintStatus::Failed);
    assert_eq!(
        notary.guard().check_duplicate(&failed.fingerprint).await.unwrap(),
        Some(partial.clone())
    );

    fixture.ledger.hold_receipts(false).await;
    let outcome = notary.anchor(&record.id).await.unwrap();
    let AnchorOutcome::Duplicate(dup) = outcome else {
        panic!("expected duplicate, got {:?}", outcome)
    };
    assert_eq!(dup.attempt, 2);
    assert_eq!(dup.duplicate_of, Some(partial.clone()));
    assert_eq!(fixture.ledger.messages(&fixture.topic_id).await.len(), 1);

    let history = notary.history(&record.id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|i| i.status).collect();
    assert_eq!(statuses, vec![ImprintStatus::Failed, ImprintStatus::Duplicate]);

    let result = notary
        .verifier()
        .verify(VerifyRequest::by_record_id("post-1"))
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.imprint_status, Some(ImprintStatus::Duplicate));
    assert_eq!(result.proof, Some(partial));
}

#[tokio::test]
async fn test_failure_during_submission_is_not_overwritten() {
    let (fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();

    fixture.ledger.set_latency(Some(Duration::from_millis(300))).await;
    let operator = notary.clone();
    let (outcome, aborted) = tokio::join!(notary.anchor(&record.id), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        operator
            .advance(&record.id, ImprintEvent::SubmissionFailed("operator abort".into()))
            .await
    });

    let aborted = aborted.unwrap();
    assert_eq!(aborted.status, ImprintStatus::Failed);

    let outcome = outcome.unwrap();
    let AnchorOutcome::Failed(failed) = outcome else {
        panic!("expected failure, got {:?}", outcome)
    };
    assert_eq!(failed, aborted);

    let history = notary.history(&record.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ImprintStatus::Failed);
    assert_eq!(history[0].failure_reason.as_deref(), Some("operator abort"));
    assert_eq!(history[0].proof, None);
}

#[tokio::test]
async fn test_concurrent_anchors_submit_once() {
    let (fixture, notary) = setup().await;
    let record = fixtures::hello_world_record();
    notary.register(&record).await.unwrap();

    let other = notary.clone();
    let (a, b) = tokio::join!(notary.anchor(&record.id), other.anchor(&record.id));
    let outcomes = [a.unwrap(), b.unwrap()];

    let confirmed = outcomes
        .iter()
        .filter(|o| matches!(o, AnchorOutcome::Confirmed(_)))
        .count();
    assert_eq!(confirmed, 1);
    assert_eq!(fixture.ledger.messages(&fixture.topic_id).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_record() {
    let (_fixture, notary) = setup().await;
    let ghost = RecordId::new("ghost");
    assert!(matches!(notary.anchor(&ghost).await, Err(NotaryError::NotFound(_))));
    assert!(matches!(notary.history(&ghost).await, Err(NotaryError::NotFound(_))));
}

#[tokio::test]
async fn test_submission_queue_drains() {
    let (fixture, notary) = setup().await;
    let mut ids = Vec::new();
    for n in 0..5 {
        let record = fixtures::numbered_record(n);
        notary.register(&record).await.unwrap();
        ids.push(record.id);
    }

    let (queue, worker) = SubmissionQueue::spawn(notary.clone(), 2);
    for id in &ids {
        queue.enqueue(id.clone()).await.unwrap();
    }
    queue.enqueue(RecordId::new("ghost")).await.unwrap();
    drop(queue);

    let stats = worker.await.unwrap();
    assert_eq!(stats.processed, 6);
    assert_eq!(stats.confirmed, 5);
    assert_eq!(stats.errors, 1);
    assert_eq!(fixture.ledger.messages(&fixture.topic_id).await.len(), 5);

    for id in &ids {
        assert_eq!(
            notary.current_imprint(id).await.unwrap().status,
            ImprintStatus::Confirmed
        );
    }
}

fn sample_proof() -> imprint::ProofDescriptor {
    use imprint::core::{AccountId, TopicId, TransactionId};
    let at = Utc::now();
    imprint::ProofDescriptor {
        topic_id: TopicId::new(0, 0, 42),
        sequence_number: None,
        transaction_id: TransactionId::generate(AccountId::new(0, 0, 7), at),
        submitted_at: at,
    }
}
