//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use imprint_core::{
    AuthorId, ContentRecord, Fingerprint, Imprint, ImprintStatus, ProofDescriptor, RecordId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    claim_after_save, decide_claim, BeginOutcome, Claim, ClaimDecision, InsertResult,
    ProofRetention, SaveOutcome, Store, StoredRecord,
};

const RECORD_COLUMNS: &str = "record_id, author_id, body, tags, image_refs, video_refs, \
     primary_image, created_at, fingerprint, registered_at";

const IMPRINT_COLUMNS: &str = "record_id, attempt, fingerprint, status, \
     topic_id, sequence_number, transaction_id, submitted_at, \
     dup_topic_id, dup_sequence_number, dup_transaction_id, dup_submitted_at, \
     failure_reason, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Close the database, flushing anything SQLite still buffers.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|e| StoreError::Poisoned(e.to_string()))?;
                conn.close().map_err(|(_, e)| StoreError::Database(e))
            }
            // A blocking task still holds a handle; the connection closes on its drop.
            Err(_) => Ok(()),
        }
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn conversion_error(idx: usize, ty: Type, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn fingerprint_column(row: &Row<'_>, name: &str) -> rusqlite::Result<Fingerprint> {
    let bytes: Vec<u8> = row.get(name)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, name.into(), Type::Blob))?;
    Ok(Fingerprint::from_bytes(arr))
}

fn json_list_column(row: &Row<'_>, name: &str) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(name)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(0, Type::Text, e))
}

// Helper to convert a row to StoredRecord
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let record = ContentRecord {
        id: RecordId::new(row.get::<_, String>("record_id")?),
        author_id: AuthorId::new(row.get::<_, String>("author_id")?),
        body: row.get("body")?,
        tags: json_list_column(row, "tags")?,
        image_refs: json_list_column(row, "image_refs")?,
        video_refs: json_list_column(row, "video_refs")?,
        primary_image: row.get("primary_image")?,
        created_at: row.get("created_at")?,
    };

    Ok(StoredRecord {
        record,
        fingerprint: fingerprint_column(row, "fingerprint")?,
        registered_at: row.get("registered_at")?,
    })
}

/// Read a proof spread over four columns sharing `prefix`.
fn proof_columns(row: &Row<'_>, prefix: &str) -> rusqlite::Result<Option<ProofDescriptor>> {
    let topic: Option<String> = row.get(format!("{}topic_id", prefix).as_str())?;
    let seq: Option<i64> = row.get(format!("{}sequence_number", prefix).as_str())?;
    let tx: Option<String> = row.get(format!("{}transaction_id", prefix).as_str())?;
    let submitted_at: Option<DateTime<Utc>> =
        row.get(format!("{}submitted_at", prefix).as_str())?;

    match (topic, tx, submitted_at) {
        (Some(topic), Some(tx), Some(submitted_at)) => Ok(Some(ProofDescriptor {
            topic_id: topic.parse().map_err(|e| conversion_error(0, Type::Text, e))?,
            sequence_number: seq.map(|s| s as u64),
            transaction_id: tx.parse().map_err(|e| conversion_error(0, Type::Text, e))?,
            submitted_at,
        })),
        _ => Ok(None),
    }
}

fn row_to_imprint(row: &Row<'_>) -> rusqlite::Result<Imprint> {
    let status_text: String = row.get("status")?;
    let status = ImprintStatus::parse(&status_text)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, "status".into(), Type::Text))?;

    Ok(Imprint {
        record_id: RecordId::new(row.get::<_, String>("record_id")?),
        attempt: row.get("attempt")?,
        fingerprint: fingerprint_column(row, "fingerprint")?,
        status,
        proof: proof_columns(row, "")?,
        duplicate_of: proof_columns(row, "dup_")?,
        failure_reason: row.get("failure_reason")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_claim(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        fingerprint: fingerprint_column(row, "fingerprint")?,
        record_id: RecordId::new(row.get::<_, String>("record_id")?),
        attempt: row.get("attempt")?,
        proof: proof_columns(row, "")?,
    })
}

/// The four column values of an optional proof.
fn proof_params(
    proof: Option<&ProofDescriptor>,
) -> (Option<String>, Option<i64>, Option<String>, Option<DateTime<Utc>>) {
    match proof {
        Some(p) => (
            Some(p.topic_id.to_string()),
            p.sequence_number.map(|s| s as i64),
            Some(p.transaction_id.to_string()),
            Some(p.submitted_at),
        ),
        None => (None, None, None, None),
    }
}

fn record_exists(conn: &Connection, id: &RecordId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM records WHERE record_id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_imprint(conn: &Connection, imprint: &Imprint) -> Result<()> {
    let (topic, seq, tx, submitted) = proof_params(imprint.proof.as_ref());
    let (dup_topic, dup_seq, dup_tx, dup_submitted) = proof_params(imprint.duplicate_of.as_ref());

    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO imprints ({}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            IMPRINT_COLUMNS
        ),
        params![
            imprint.record_id.as_str(),
            imprint.attempt,
            imprint.fingerprint.as_bytes().as_slice(),
            imprint.status.as_str(),
            topic,
            seq,
            tx,
            submitted,
            dup_topic,
            dup_seq,
            dup_tx,
            dup_submitted,
            imprint.failure_reason,
            imprint.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrite an attempt's row only while it is still at `expected`.
/// Returns whether the row changed.
fn update_imprint_if(conn: &Connection, imprint: &Imprint, expected: ImprintStatus) -> Result<bool> {
    let (topic, seq, tx, submitted) = proof_params(imprint.proof.as_ref());
    let (dup_topic, dup_seq, dup_tx, dup_submitted) = proof_params(imprint.duplicate_of.as_ref());

    let changed = conn.execute(
        "UPDATE imprints SET
            fingerprint = ?3, status = ?4,
            topic_id = ?5, sequence_number = ?6, transaction_id = ?7, submitted_at = ?8,
            dup_topic_id = ?9, dup_sequence_number = ?10, dup_transaction_id = ?11,
            dup_submitted_at = ?12, failure_reason = ?13, updated_at = ?14
         WHERE record_id = ?1 AND attempt = ?2 AND status = ?15",
        params![
            imprint.record_id.as_str(),
            imprint.attempt,
            imprint.fingerprint.as_bytes().as_slice(),
            imprint.status.as_str(),
            topic,
            seq,
            tx,
            submitted,
            dup_topic,
            dup_seq,
            dup_tx,
            dup_submitted,
            imprint.failure_reason,
            imprint.updated_at,
            expected.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

fn write_claim(conn: &Connection, claim: &Claim) -> Result<()> {
    let (topic, seq, tx, submitted) = proof_params(claim.proof.as_ref());
    conn.execute(
        "INSERT OR REPLACE INTO fingerprint_claims
            (fingerprint, record_id, attempt, topic_id, sequence_number, transaction_id, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            claim.fingerprint.as_bytes().as_slice(),
            claim.record_id.as_str(),
            claim.attempt,
            topic,
            seq,
            tx,
            submitted,
        ],
    )?;
    Ok(())
}

fn read_claim(conn: &Connection, fingerprint: &Fingerprint) -> Result<Option<Claim>> {
    conn.query_row(
        "SELECT fingerprint, record_id, attempt, topic_id, sequence_number, transaction_id, submitted_at
         FROM fingerprint_claims WHERE fingerprint = ?1",
        params![fingerprint.as_bytes().as_slice()],
        row_to_claim,
    )
    .optional()
    .map_err(StoreError::from)
}

fn read_imprint(conn: &Connection, id: &RecordId, attempt: u32) -> Result<Option<Imprint>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM imprints WHERE record_id = ?1 AND attempt = ?2",
            IMPRINT_COLUMNS
        ),
        params![id.as_str(), attempt],
        row_to_imprint,
    )
    .optional()
    .map_err(StoreError::from)
}

fn read_current(conn: &Connection, id: &RecordId) -> Result<Option<Imprint>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM imprints WHERE record_id = ?1 ORDER BY attempt DESC LIMIT 1",
            IMPRINT_COLUMNS
        ),
        params![id.as_str()],
        row_to_imprint,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_record(
        &self,
        record: &ContentRecord,
        fingerprint: &Fingerprint,
        at: DateTime<Utc>,
    ) -> Result<InsertResult> {
        let record = record.clone();
        let fingerprint = *fingerprint;

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if record_exists(&tx, &record.id)? {
                return Ok(InsertResult::AlreadyExists);
            }

            tx.execute(
                &format!(
                    "INSERT INTO records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    RECORD_COLUMNS
                ),
                params![
                    record.id.as_str(),
                    record.author_id.as_str(),
                    record.body,
                    serde_json::to_string(&record.tags)?,
                    serde_json::to_string(&record.image_refs)?,
                    serde_json::to_string(&record.video_refs)?,
                    record.primary_image,
                    record.created_at,
                    fingerprint.as_bytes().as_slice(),
                    at,
                ],
            )?;
            write_imprint(&tx, &Imprint::new(record.id.clone(), fingerprint, at))?;

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn update_record(&self, record: &ContentRecord) -> Result<()> {
        let record = record.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE records SET author_id = ?2, body = ?3, tags = ?4, image_refs = ?5,
                        video_refs = ?6, primary_image = ?7, created_at = ?8
                 WHERE record_id = ?1",
                params![
                    record.id.as_str(),
                    record.author_id.as_str(),
                    record.body,
                    serde_json::to_string(&record.tags)?,
                    serde_json::to_string(&record.image_refs)?,
                    serde_json::to_string(&record.video_refs)?,
                    record.primary_image,
                    record.created_at,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(record.id.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<StoredRecord>> {
        let id = id.clone();

        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM records WHERE record_id = ?1", RECORD_COLUMNS),
                params![id.as_str()],
                row_to_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_records_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<RecordId>> {
        let fingerprint = *fingerprint;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT record_id FROM records WHERE fingerprint = ?1 ORDER BY record_id",
            )?;
            let ids = stmt
                .query_map(params![fingerprint.as_bytes().as_slice()], |row| {
                    row.get::<_, String>(0).map(RecordId::new)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn current_imprint(&self, id: &RecordId) -> Result<Option<Imprint>> {
        let id = id.clone();
        self.blocking(move |conn| read_current(conn, &id)).await
    }

    async fn imprint_history(&self, id: &RecordId) -> Result<Vec<Imprint>> {
        let id = id.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM imprints WHERE record_id = ?1 ORDER BY attempt",
                IMPRINT_COLUMNS
            ))?;
            let history = stmt
                .query_map(params![id.as_str()], row_to_imprint)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(history)
        })
        .await
    }

    async fn save_imprint(
        &self,
        imprint: &Imprint,
        expected: ImprintStatus,
        retention: ProofRetention,
    ) -> Result<SaveOutcome> {
        let imprint = imprint.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !update_imprint_if(&tx, &imprint, expected)? {
                let stored = read_imprint(&tx, &imprint.record_id, imprint.attempt)?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!(
                            "{} attempt {}",
                            imprint.record_id, imprint.attempt
                        ))
                    })?;
                return Ok(SaveOutcome::Conflict(stored));
            }

            let existing = read_claim(&tx, &imprint.fingerprint)?;
            if let Some(claim) = claim_after_save(existing.as_ref(), &imprint, retention) {
                write_claim(&tx, &claim)?;
            }

            tx.commit()?;
            Ok(SaveOutcome::Saved)
        })
        .await
    }

    async fn list_in_flight(&self) -> Result<Vec<Imprint>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM imprints i
                 WHERE status IN ('pending', 'submitted')
                   AND attempt = (SELECT MAX(attempt) FROM imprints WHERE record_id = i.record_id)",
                IMPRINT_COLUMNS
            ))?;
            let mut in_flight = stmt
                .query_map([], row_to_imprint)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            in_flight.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
            Ok(in_flight)
        })
        .await
    }

    async fn begin_attempt(&self, candidate: &Imprint, at: DateTime<Utc>) -> Result<BeginOutcome> {
        let candidate = candidate.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !record_exists(&tx, &candidate.record_id)? {
                return Err(StoreError::NotFound(candidate.record_id.to_string()));
            }

            let stored = read_imprint(&tx, &candidate.record_id, candidate.attempt)?;
            let existing = read_claim(&tx, &candidate.fingerprint)?;
            let owner_status = match &existing {
                Some(claim) => read_imprint(&tx, &claim.record_id, claim.attempt)?.map(|i| i.status),
                None => None,
            };

            let outcome = match decide_claim(&candidate, stored, existing, owner_status, at)? {
                ClaimDecision::Claim(pending) => {
                    write_claim(
                        &tx,
                        &Claim {
                            fingerprint: pending.fingerprint,
                            record_id: pending.record_id.clone(),
                            attempt: pending.attempt,
                            proof: None,
                        },
                    )?;
                    write_imprint(&tx, &pending)?;
                    BeginOutcome::Pending(pending)
                }
                ClaimDecision::Duplicate(dup) => {
                    write_imprint(&tx, &dup)?;
                    BeginOutcome::Duplicate(dup)
                }
                ClaimDecision::InFlight(claim) => BeginOutcome::InFlight(claim),
                ClaimDecision::Superseded(stored) => BeginOutcome::Superseded(stored),
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn get_claim(&self, fingerprint: &Fingerprint) -> Result<Option<Claim>> {
        let fingerprint = *fingerprint;
        self.blocking(move |conn| read_claim(conn, &fingerprint)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use imprint_core::{
        fingerprint_record, AccountId, ImprintEvent, TopicId, TransactionId, Transition,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    fn record(id: &str) -> ContentRecord {
        ContentRecord::new(id, "user-1", "  hello  ", at(0))
            .with_tags(["z", "a"])
            .with_image("i.png")
            .with_primary_image("cover.png")
    }

    fn proof(seq: Option<u64>) -> ProofDescriptor {
        ProofDescriptor {
            topic_id: TopicId::new(0, 0, 5),
            sequence_number: seq,
            transaction_id: TransactionId::generate(
                AccountId::new(0, 0, 2),
                Utc.timestamp_opt(1_704_067_201, 123_456_789).unwrap(),
            ),
            submitted_at: Utc.timestamp_opt(1_704_067_201, 987_654_321).unwrap(),
        }
    }

    fn applied(t: Transition) -> Imprint {
        match t {
            Transition::Applied(i) => i,
            Transition::Ignored => panic!("ignored"),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_record() {
        let store = SqliteStore::open_memory().unwrap();
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();

        assert_eq!(
            store.insert_record(&r, &fp, at(1)).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.insert_record(&r, &fp, at(2)).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let stored = store.get_record(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.record, r);
        assert_eq!(stored.fingerprint, fp);
        assert_eq!(stored.registered_at, at(1));

        let imprint = store.current_imprint(&r.id).await.unwrap().unwrap();
        assert_eq!(imprint.status, ImprintStatus::None);
    }

    #[tokio::test]
    async fn test_imprint_roundtrip_with_proofs() {
        let store = SqliteStore::open_memory().unwrap();
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();
        store.insert_record(&r, &fp, at(0)).await.unwrap();

        let none = store.current_imprint(&r.id).await.unwrap().unwrap();
        let pending = match store.begin_attempt(&none, at(1)).await.unwrap() {
            BeginOutcome::Pending(p) => p,
            other => panic!("expected pending, got {:?}", other),
        };
        let submitted = applied(
            pending
                .apply(ImprintEvent::SubmitAccepted(proof(None)), at(2))
                .unwrap(),
        );
        store
            .save_imprint(&submitted, ImprintStatus::Pending, ProofRetention::Withdraw)
            .await
            .unwrap();
        let confirmed = applied(
            submitted
                .apply(ImprintEvent::ReceiptObtained(proof(Some(42))), at(3))
                .unwrap(),
        );
        store
            .save_imprint(&confirmed, ImprintStatus::Submitted, ProofRetention::Withdraw)
            .await
            .unwrap();

        let loaded = store.current_imprint(&r.id).await.unwrap().unwrap();
        assert_eq!(loaded, confirmed);

        let claim = store.get_claim(&fp).await.unwrap().unwrap();
        assert_eq!(claim.proof, Some(proof(Some(42))));
        assert!(store.list_in_flight().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempt_history_is_kept() {
        let store = SqliteStore::open_memory().unwrap();
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();
        store.insert_record(&r, &fp, at(0)).await.unwrap();

        let none = store.current_imprint(&r.id).await.unwrap().unwrap();
        let BeginOutcome::Pending(pending) = store.begin_attempt(&none, at(1)).await.unwrap() else {
            panic!("expected pending")
        };
        let failed = applied(
            pending
                .apply(ImprintEvent::SubmissionFailed("timeout".into()), at(2))
                .unwrap(),
        );
        store
            .save_imprint(&failed, ImprintStatus::Pending, ProofRetention::Withdraw)
            .await
            .unwrap();

        let retry = failed.next_attempt(fp, at(3)).unwrap();
        let BeginOutcome::Pending(second) = store.begin_attempt(&retry, at(3)).await.unwrap() else {
            panic!("expected pending")
        };
        assert_eq!(second.attempt, 2);

        let history = store.imprint_history(&r.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, ImprintStatus::Failed);
        assert_eq!(history[0].failure_reason.as_deref(), Some("timeout"));
        assert_eq!(history[1].status, ImprintStatus::Pending);

        let in_flight = store.list_in_flight().await.unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].attempt, 2);
    }

    #[tokio::test]
    async fn test_terminal_row_is_not_overwritten() {
        let store = SqliteStore::open_memory().unwrap();
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();
        store.insert_record(&r, &fp, at(0)).await.unwrap();

        let none = store.current_imprint(&r.id).await.unwrap().unwrap();
        let BeginOutcome::Pending(pending) = store.begin_attempt(&none, at(1)).await.unwrap() else {
            panic!("expected pending")
        };
        let submitted = applied(
            pending
                .apply(ImprintEvent::SubmitAccepted(proof(None)), at(2))
                .unwrap(),
        );
        store
            .save_imprint(&submitted, ImprintStatus::Pending, ProofRetention::Withdraw)
            .await
            .unwrap();

        // receipt deadline passed: the attempt fails but its proof stays claimed
        let failed = applied(
            submitted
                .apply(ImprintEvent::SubmissionFailed("no receipt".into()), at(3))
                .unwrap(),
        );
        let saved = store
            .save_imprint(&failed, ImprintStatus::Submitted, ProofRetention::Keep)
            .await
            .unwrap();
        assert_eq!(saved, SaveOutcome::Saved);
        assert_eq!(store.get_claim(&fp).await.unwrap().unwrap().proof, Some(proof(None)));

        // a late receipt from the old snapshot cannot revive it
        let confirmed = applied(
            submitted
                .apply(ImprintEvent::ReceiptObtained(proof(Some(9))), at(4))
                .unwrap(),
        );
        let outcome = store
            .save_imprint(&confirmed, ImprintStatus::Submitted, ProofRetention::Withdraw)
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Conflict(failed.clone()));
        assert_eq!(store.current_imprint(&r.id).await.unwrap(), Some(failed.clone()));

        // the retry points at the kept proof
        let retry = failed.next_attempt(fp, at(5)).unwrap();
        match store.begin_attempt(&retry, at(5)).await.unwrap() {
            BeginOutcome::Duplicate(dup) => assert_eq!(dup.duplicate_of, Some(proof(None))),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_record_and_reverse_lookup() {
        let store = SqliteStore::open_memory().unwrap();
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();
        store.insert_record(&r, &fp, at(0)).await.unwrap();

        let mut edited = r.clone();
        edited.body = "tampered".into();
        store.update_record(&edited).await.unwrap();

        let stored = store.get_record(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.record.body, "tampered");
        assert_eq!(stored.fingerprint, fp);
        assert_eq!(
            store.find_records_by_fingerprint(&fp).await.unwrap(),
            vec![r.id.clone()]
        );

        assert!(matches!(
            store.update_record(&record("ghost")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imprint.db");
        let r = record("p1");
        let fp = fingerprint_record(&r).unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_record(&r, &fp, at(0)).await.unwrap();
            store.close().unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stored = store.get_record(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.fingerprint, fp);
    }
}
