//! Error type for `signet-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] signet_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("version {version} of document {document_id} not found")]
  VersionNotFound { document_id: Uuid, version: u32 },

  /// Another writer appended this version first. The caller must re-read the
  /// latest snapshot and rebuild its mutation on top of it.
  #[error("version conflict on document {document_id} at version {version}")]
  Conflict { document_id: Uuid, version: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
