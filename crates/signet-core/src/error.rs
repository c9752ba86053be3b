//! Error taxonomy for the Signet core.
//!
//! Validation and state-machine errors are returned synchronously and never
//! retried. Only transient ledger failures are retried (by the registration
//! coordinator, up to its attempt cap). Side-effect failures — notification,
//! email, audit-log writes — are caught and logged by the caller, never
//! escalated.

use thiserror::Error;
use uuid::Uuid;

use crate::{document::DocumentStatus, participant::ParticipantStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation error: {0}")]
  Validation(String),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("version {version} of document {document_id} not found")]
  VersionNotFound { document_id: Uuid, version: u32 },

  #[error("participant not found: {0}")]
  ParticipantNotFound(Uuid),

  #[error("signing link not found or expired")]
  SigningLinkNotFound,

  #[error("invalid status transition: {from} -> {to}")]
  InvalidStatusTransition {
    from: DocumentStatus,
    to:   DocumentStatus,
  },

  #[error("participant {participant} cannot move from {from} to {to}")]
  InvalidParticipantTransition {
    participant: Uuid,
    from:        ParticipantStatus,
    to:          ParticipantStatus,
  },

  #[error("document {0} is already registered")]
  AlreadyRegistered(Uuid),

  #[error("registration unavailable after {attempts} attempts")]
  RegistrationUnavailable { attempts: u32 },

  /// Two writers raced to append the same version of a document. The loser
  /// must re-read the latest snapshot before retrying its mutation.
  #[error("version conflict on document {document_id} at version {version}")]
  Conflict { document_id: Uuid, version: u32 },

  #[error("service unavailable: {0}")]
  ServiceUnavailable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
