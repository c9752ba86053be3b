//! signet worker binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite version store, and consumes the workflow queue until interrupted.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use signet_pdf::{FontCatalog, SignaturePlacementEngine};
use signet_store_sqlite::SqliteStore;
use signet_worker::{
  adapters::{FsObjectStore, InMemoryQueue, LogNotifier, SimulatedLedger},
  WorkerConfig, WorkflowConsumer,
};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Signet workflow worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SIGNET"))
    .build()
    .context("failed to read config file")?;

  let worker_cfg: WorkerConfig = settings
    .try_deserialize()
    .context("failed to deserialise WorkerConfig")?;

  let store_path = expand_tilde(&worker_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let fonts = match &worker_cfg.fonts_dir {
    Some(dir) => FontCatalog::load(dir),
    None => FontCatalog::empty(),
  };

  let engine = Arc::new(SignaturePlacementEngine::new(fonts));
  let storage = Arc::new(FsObjectStore::new(&worker_cfg.storage_root));
  let queue = Arc::new(InMemoryQueue::new());
  let ledger = Arc::new(SimulatedLedger::new(&worker_cfg.ledger_network));
  let notifier = Arc::new(LogNotifier);

  let cancel = CancellationToken::new();
  let consumer = WorkflowConsumer::new(
    store,
    storage,
    queue,
    ledger,
    notifier,
    engine,
    Arc::new(worker_cfg),
    cancel.clone(),
  );

  let runner = tokio::spawn(async move { consumer.run().await });

  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for shutdown signal")?;
  tracing::info!("shutdown requested, draining in-flight work");
  cancel.cancel();
  runner.await.context("consumer task panicked")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
