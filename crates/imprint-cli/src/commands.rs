//! Subcommand implementations. Each returns the JSON document to print.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::{json, Value};

use imprint::core::{canonicalize, fingerprint, ContentRecord, RecordId};
use imprint::ledger::LedgerClient;
use imprint::store::Store;
use imprint::{Notary, VerifyError, VerifyRequest};

/// Read a content record from a JSON file (camelCase keys).
pub fn read_record(path: &Path) -> anyhow::Result<ContentRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Canonical form and fingerprint of a record, without touching storage.
pub fn fingerprint_file(path: &Path) -> anyhow::Result<Value> {
    let record = read_record(path)?;
    let canonical = canonicalize(&record)?;
    let fp = fingerprint(&canonical)?;
    Ok(json!({
        "recordId": record.id,
        "canonical": canonical.to_canonical_string()?,
        "fingerprint": fp,
    }))
}

pub async fn register<S: Store, C: LedgerClient>(
    notary: &Notary<S, C>,
    path: &Path,
) -> anyhow::Result<Value> {
    let record = read_record(path)?;
    let registration = notary.register(&record).await?;
    Ok(serde_json::to_value(registration)?)
}

pub async fn anchor<S: Store, C: LedgerClient>(
    notary: &Notary<S, C>,
    record_id: &str,
) -> anyhow::Result<Value> {
    let outcome = notary.anchor(&RecordId::new(record_id)).await?;
    let explorer = outcome
        .imprint()
        .effective_proof()
        .map(|proof| notary.ledger().explorer_url(&proof.transaction_id));
    Ok(json!({
        "outcome": outcome.as_str(),
        "imprint": outcome.imprint(),
        "explorerUrl": explorer,
    }))
}

/// Verify a record id or a content file. Exactly one must be given.
pub async fn verify<S: Store, C: LedgerClient>(
    notary: &Notary<S, C>,
    record_id: Option<String>,
    content: Option<&Path>,
) -> anyhow::Result<Result<Value, Value>> {
    let raw_content = content.map(read_record).transpose()?;
    let request = VerifyRequest {
        record_id: record_id.map(RecordId::new),
        raw_content,
    };

    match notary.verifier().verify(request).await {
        Ok(result) => Ok(Ok(serde_json::to_value(result)?)),
        Err(e) => Ok(Err(verify_error(&e))),
    }
}

fn verify_error(e: &VerifyError) -> Value {
    json!({
        "error": e.to_string(),
        "httpStatus": e.http_status(),
    })
}

pub async fn history<S: Store, C: LedgerClient>(
    notary: &Notary<S, C>,
    record_id: &str,
) -> anyhow::Result<Value> {
    let history = notary.history(&RecordId::new(record_id)).await?;
    Ok(serde_json::to_value(history)?)
}

pub async fn reconcile<S: Store, C: LedgerClient>(notary: &Notary<S, C>) -> anyhow::Result<Value> {
    let report = notary.reconcile(Utc::now()).await?;
    Ok(serde_json::to_value(report)?)
}

/// Parse a duration given in seconds.
pub fn parse_secs(s: &str) -> anyhow::Result<std::time::Duration> {
    let secs: u64 = s.trim().parse().with_context(|| format!("not a number of seconds: {}", s))?;
    if secs == 0 {
        bail!("duration must be positive");
    }
    Ok(std::time::Duration::from_secs(secs))
}
