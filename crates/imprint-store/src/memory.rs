//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use imprint_core::{ContentRecord, Fingerprint, Imprint, ImprintStatus, RecordId};

use crate::error::{Result, StoreError};
use crate::traits::{
    claim_after_save, decide_claim, BeginOutcome, Claim, ClaimDecision, InsertResult,
    ProofRetention, SaveOutcome, Store, StoredRecord,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// write path takes the single write lock, which makes `begin_attempt` atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: HashMap<RecordId, StoredRecord>,

    /// Attempts per record, keyed by attempt number.
    imprints: HashMap<RecordId, BTreeMap<u32, Imprint>>,

    claims: HashMap<Fingerprint, Claim>,
}

impl MemoryStoreInner {
    fn current(&self, id: &RecordId) -> Option<&Imprint> {
        self.imprints
            .get(id)
            .and_then(|attempts| attempts.values().next_back())
    }

    fn attempt(&self, id: &RecordId, attempt: u32) -> Option<&Imprint> {
        self.imprints
            .get(id)
            .and_then(|attempts| attempts.get(&attempt))
    }

    fn put_imprint(&mut self, imprint: &Imprint) {
        self.imprints
            .entry(imprint.record_id.clone())
            .or_default()
            .insert(imprint.attempt, imprint.clone());
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_record(
        &self,
        record: &ContentRecord,
        fingerprint: &Fingerprint,
        at: DateTime<Utc>,
    ) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.records.contains_key(&record.id) {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.records.insert(
            record.id.clone(),
            StoredRecord {
                record: record.clone(),
                fingerprint: *fingerprint,
                registered_at: at,
            },
        );
        inner.put_imprint(&Imprint::new(record.id.clone(), *fingerprint, at));

        Ok(InsertResult::Inserted)
    }

    async fn update_record(&self, record: &ContentRecord) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .records
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.to_string()))?;
        stored.record = record.clone();
        Ok(())
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<StoredRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn find_records_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<RecordId>> {
        let inner = self.read()?;
        let mut ids: Vec<RecordId> = inner
            .records
            .values()
            .filter(|stored| &stored.fingerprint == fingerprint)
            .map(|stored| stored.record.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn current_imprint(&self, id: &RecordId) -> Result<Option<Imprint>> {
        Ok(self.read()?.current(id).cloned())
    }

    async fn imprint_history(&self, id: &RecordId) -> Result<Vec<Imprint>> {
        Ok(self
            .read()?
            .imprints
            .get(id)
            .map(|attempts| attempts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_imprint(
        &self,
        imprint: &Imprint,
        expected: ImprintStatus,
        retention: ProofRetention,
    ) -> Result<SaveOutcome> {
        let mut inner = self.write()?;

        let stored = inner
            .attempt(&imprint.record_id, imprint.attempt)
            .ok_or_else(|| {
                StoreError::NotFound(format!("{} attempt {}", imprint.record_id, imprint.attempt))
            })?;
        if stored.status != expected {
            return Ok(SaveOutcome::Conflict(stored.clone()));
        }

        inner.put_imprint(imprint);
        let update = claim_after_save(inner.claims.get(&imprint.fingerprint), imprint, retention);
        if let Some(claim) = update {
            inner.claims.insert(claim.fingerprint, claim);
        }

        Ok(SaveOutcome::Saved)
    }

    async fn list_in_flight(&self) -> Result<Vec<Imprint>> {
        let inner = self.read()?;
        let mut in_flight: Vec<Imprint> = inner
            .imprints
            .keys()
            .filter_map(|id| inner.current(id))
            .filter(|imprint| imprint.status.is_in_flight())
            .cloned()
            .collect();
        in_flight.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(in_flight)
    }

    async fn begin_attempt(&self, candidate: &Imprint, at: DateTime<Utc>) -> Result<BeginOutcome> {
        let mut inner = self.write()?;

        if !inner.records.contains_key(&candidate.record_id) {
            return Err(StoreError::NotFound(candidate.record_id.to_string()));
        }

        let stored = inner.attempt(&candidate.record_id, candidate.attempt).cloned();
        let existing = inner.claims.get(&candidate.fingerprint).cloned();
        let owner_status = existing.as_ref().and_then(|claim| {
            inner
                .attempt(&claim.record_id, claim.attempt)
                .map(|owner| owner.status)
        });

        match decide_claim(candidate, stored, existing, owner_status, at)? {
            ClaimDecision::Claim(pending) => {
                inner.claims.insert(
                    pending.fingerprint,
                    Claim {
                        fingerprint: pending.fingerprint,
                        record_id: pending.record_id.clone(),
                        attempt: pending.attempt,
                        proof: None,
                    },
                );
                inner.put_imprint(&pending);
                Ok(BeginOutcome::Pending(pending))
            }
            ClaimDecision::Duplicate(dup) => {
                inner.put_imprint(&dup);
                Ok(BeginOutcome::Duplicate(dup))
            }
            ClaimDecision::InFlight(claim) => Ok(BeginOutcome::InFlight(claim)),
            ClaimDecision::Superseded(stored) => Ok(BeginOutcome::Superseded(stored)),
        }
    }

    async fn get_claim(&self, fingerprint: &Fingerprint) -> Result<Option<Claim>> {
        Ok(self.read()?.claims.get(fingerprint).cloned())
    }
}
