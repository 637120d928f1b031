//! imprint-cli: operator tool for Imprint.
//!
//! Registers content records, anchors their fingerprints on the configured
//! ledger topic, answers dispute-time verification requests and runs the
//! reconciliation sweep. Every command prints one JSON document to stdout;
//! logs go to stderr.
//!
//! Ledger settings come from `IMPRINT_*` environment variables (see
//! `imprint::ledger::LedgerConfig`); flags below override them.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use imprint::ledger::{HttpLedgerClient, LedgerAdapter, LedgerConfig};
use imprint::store::SqliteStore;
use imprint::{Notary, NotaryConfig};

#[derive(Parser)]
#[command(name = "imprint")]
#[command(about = "Tamper-evident fingerprints for user content, anchored on a public ledger")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = "IMPRINT_DB", default_value = "imprint.db", global = true)]
    db: PathBuf,

    /// Log filter, e.g. `info` or `imprint=debug` (falls back to RUST_LOG)
    #[arg(long, env = "IMPRINT_LOG", global = true)]
    log_level: Option<String>,

    /// Submission gateway URL (overrides IMPRINT_GATEWAY_URL)
    #[arg(long, global = true)]
    gateway_url: Option<String>,

    /// Ledger topic (overrides IMPRINT_TOPIC_ID)
    #[arg(long, global = true)]
    topic_id: Option<String>,

    /// Seconds before an unanswered `pending` attempt is failed
    #[arg(long, env = "IMPRINT_STALE_AFTER_SECS", default_value = "300", value_parser = commands::parse_secs, global = true)]
    stale_after: Duration,

    /// Seconds before a `submitted` attempt without a receipt is failed
    #[arg(long, env = "IMPRINT_RECEIPT_DEADLINE_SECS", default_value = "3600", value_parser = commands::parse_secs, global = true)]
    receipt_deadline: Duration,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical form and fingerprint of a record file
    Fingerprint {
        /// JSON content record
        file: PathBuf,
    },

    /// Register a record file and persist its fingerprint
    Register {
        /// JSON content record
        file: PathBuf,
    },

    /// Submit a registered record's fingerprint to the ledger
    Anchor {
        record_id: String,
    },

    /// Recompute a fingerprint and compare it with the persisted one
    Verify {
        /// Registered record to verify
        #[arg(long, conflicts_with = "content")]
        record_id: Option<String>,

        /// JSON content record to look up by fingerprint
        #[arg(long)]
        content: Option<PathBuf>,
    },

    /// List every anchoring attempt for a record
    History {
        record_id: String,
    },

    /// Finish or fail attempts left in flight
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let output = match &cli.command {
        // Pure: no storage, no credentials.
        Command::Fingerprint { file } => commands::fingerprint_file(file)?,
        Command::Register { file } => commands::register(&open_notary(&cli)?, file).await?,
        Command::Anchor { record_id } => commands::anchor(&open_notary(&cli)?, record_id).await?,
        Command::Verify { record_id, content } => {
            let notary = open_notary(&cli)?;
            match commands::verify(&notary, record_id.clone(), content.as_deref()).await? {
                Ok(result) => result,
                Err(error) => {
                    print(&error)?;
                    std::process::exit(2);
                }
            }
        }
        Command::History { record_id } => commands::history(&open_notary(&cli)?, record_id).await?,
        Command::Reconcile => commands::reconcile(&open_notary(&cli)?).await?,
    };

    print(&output)
}

fn open_notary(cli: &Cli) -> anyhow::Result<Notary<SqliteStore, HttpLedgerClient>> {
    let mut ledger_config = LedgerConfig::from_env()?;
    if let Some(url) = &cli.gateway_url {
        ledger_config.gateway_url = url.clone();
    }
    if let Some(topic) = &cli.topic_id {
        ledger_config.topic_id = Some(topic.clone());
    }
    debug!(config = ?ledger_config, "ledger configuration");

    let client = HttpLedgerClient::new(ledger_config.gateway_url.clone());
    let adapter = LedgerAdapter::new(client, &ledger_config);

    let store = SqliteStore::open(&cli.db)?;
    info!(db = %cli.db.display(), "opened store");

    Ok(Notary::new(
        store,
        adapter,
        NotaryConfig {
            stale_after: cli.stale_after,
            receipt_deadline: cli.receipt_deadline,
        },
    ))
}

fn init_tracing(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
