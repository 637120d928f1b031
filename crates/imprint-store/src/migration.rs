//! SQLite schema versions.
//!
//! `schema_migrations` records every applied version; `migrate` applies the
//! missing ones inside a single transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to `CURRENT_VERSION`. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated imprint schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// v1: records, attempts, fingerprint claims.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Content records as handed over by the application
        CREATE TABLE records (
            record_id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL,
            body TEXT NOT NULL,
            tags TEXT NOT NULL,               -- JSON array, insertion order
            image_refs TEXT NOT NULL,         -- JSON array
            video_refs TEXT NOT NULL,         -- JSON array
            primary_image TEXT,
            created_at TEXT NOT NULL,
            fingerprint BLOB NOT NULL,        -- 32 bytes, fixed at registration
            registered_at TEXT NOT NULL
        );

        -- One row per anchoring attempt; rows are never deleted
        CREATE TABLE imprints (
            record_id TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            fingerprint BLOB NOT NULL,
            status TEXT NOT NULL,             -- none|pending|submitted|confirmed|failed|duplicate
            topic_id TEXT,
            sequence_number INTEGER,
            transaction_id TEXT,
            submitted_at TEXT,
            dup_topic_id TEXT,
            dup_sequence_number INTEGER,
            dup_transaction_id TEXT,
            dup_submitted_at TEXT,
            failure_reason TEXT,
            updated_at TEXT NOT NULL,

            PRIMARY KEY (record_id, attempt)
        );

        -- Which attempt owns a fingerprint, and its proof once accepted
        CREATE TABLE fingerprint_claims (
            fingerprint BLOB PRIMARY KEY,
            record_id TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            topic_id TEXT,
            sequence_number INTEGER,
            transaction_id TEXT,
            submitted_at TEXT
        );

        CREATE INDEX idx_records_fingerprint ON records(fingerprint);
        CREATE INDEX idx_imprints_status ON imprints(status);
        CREATE INDEX idx_imprints_transaction ON imprints(transaction_id);
        "#,
    )?;

    Ok(())
}
