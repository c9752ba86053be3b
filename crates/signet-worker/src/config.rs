//! Worker runtime configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Deserialised from `config.toml` plus `SIGNET_`-prefixed environment
/// variables (see `main.rs`).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  /// SQLite database file for the version store.
  pub store_path:         PathBuf,
  /// Root directory of the filesystem object store.
  pub storage_root:       PathBuf,
  /// Directory holding the decorative signature TTFs. When absent, text
  /// signatures are skipped at stamp time.
  pub fonts_dir:          Option<PathBuf>,
  /// Base URL under which finalized documents are reachable; rendered as a
  /// QR code in the signature-record annex.
  pub public_url_base:    String,
  #[serde(default = "default_queue")]
  pub queue:              String,
  #[serde(default = "default_network")]
  pub ledger_network:     String,
  #[serde(default = "default_batch_size")]
  pub batch_size:         usize,
  #[serde(default = "default_concurrency")]
  pub max_concurrency:    usize,
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
}

fn default_queue() -> String { "workflow".into() }
fn default_network() -> String { "testnet".into() }
fn default_batch_size() -> usize { 16 }
fn default_concurrency() -> usize { 4 }
fn default_poll_interval() -> u64 { 5 }
