//! Error type for `signet-worker`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] signet_core::Error),

  #[error(transparent)]
  Flow(#[from] signet_flows::Error),

  #[error("pdf error: {0}")]
  Pdf(#[from] signet_pdf::Error),

  #[error("blocking task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("envelope is missing required field {0}")]
  MissingField(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
