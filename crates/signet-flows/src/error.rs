//! Error type for `signet-flows`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] signet_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Too many consecutive append conflicts; the caller should back off and
  /// retry the whole operation.
  #[error("conflict retry budget exhausted for document {0}")]
  ConflictBudget(Uuid),

  #[error("registration of document {0} was cancelled")]
  Cancelled(Uuid),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
    Self::Store(Box::new(error))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
