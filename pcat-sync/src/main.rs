//! pcat-sync - catalog synchronization tool
//!
//! Reconciles the photo catalog database with the flat source files in the
//! data directory, one entity kind at a time.
//!
//! ```text
//! pcat-sync sync photo        # one kind
//! pcat-sync sync all          # every kind, dependency order
//! pcat-sync show frame 7      # stored entity with retail prices
//! ```
//!
//! Summaries are printed to stdout as JSON; logs go to stderr (or the
//! configured log file). Ctrl-C stops dispatching rows and still prints
//! the summary.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pcat_common::config::{LoggingConfig, TomlConfig};
use pcat_common::db::init_database;
use pcat_common::EntityKind;
use pcat_sync::config::{CliOverrides, SyncPaths};
use pcat_sync::services::entity_view;
use pcat_sync::{CatalogSync, SqliteStore, SyncSummary};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for pcat-sync
#[derive(Parser, Debug)]
#[command(name = "pcat-sync")]
#[command(about = "Synchronize the photo catalog from flat source files")]
#[command(version)]
struct Args {
    /// Root folder holding the database and data directory
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Source file directory (default: <root>/data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database file (default: <root>/catalog.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Rows applied concurrently
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Config file (default: platform config location)
    #[arg(long, global = true, env = "PCAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize one entity kind, or `all`
    Sync {
        /// Entity kind (e.g. photo, share-images) or `all`
        target: String,
    },
    /// Print one stored entity as JSON
    Show {
        kind: EntityKind,
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => TomlConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => TomlConfig::load_or_default(),
    };
    init_tracing(&toml_config.logging)?;

    info!(
        "pcat-sync {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = CliOverrides {
        root_folder: args.root_folder,
        data_dir: args.data_dir,
        database: args.database,
        workers: args.workers,
    };
    let paths = SyncPaths::resolve(&cli, &toml_config);
    paths
        .ensure_root_folder()
        .context("Failed to initialize root folder")?;

    let pool = init_database(&paths.database_path)
        .await
        .context("Failed to open catalog database")?;
    let store = SqliteStore::new(pool.clone());

    let all_succeeded = match args.command {
        Command::Sync { target } => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_interrupt(cancel.clone()));

            let engine = CatalogSync::new(store, paths.workers);
            if target.eq_ignore_ascii_case("all") {
                let summaries = engine.sync_all(&paths.data_dir, &cancel).await;
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                summaries.iter().all(|s| s.success)
            } else {
                let kind: EntityKind = target.parse()?;
                let summary: SyncSummary = engine.sync_kind(kind, &paths.data_dir, &cancel).await;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                summary.success
            }
        }
        Command::Show { kind, id } => match entity_view(&store, kind, id).await? {
            Some(view) => {
                println!("{}", serde_json::to_string_pretty(&view)?);
                true
            }
            None => bail!("{} {} not found", kind, id),
        },
    };

    pool.close().await;

    if !all_succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Stderr logging by default, file logging when configured
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("pcat_sync={0},pcat_common={0}", logging.level))
    });

    let (stderr_layer, file_layer) = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Cancel the running sync on Ctrl-C
async fn cancel_on_interrupt(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received; finishing in-flight rows");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
    }
}
