//! Document snapshots — the fundamental unit of the version chain.
//!
//! A snapshot is an immutable record of one document at one version. Snapshots
//! are never updated; every mutation is expressed as a new snapshot with
//! `version = previous + 1`, built through [`SnapshotBuilder`] so the set of
//! changed fields is an explicit, reviewable contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::participant::Participant;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Document-level workflow status. Transitions are validated by
/// [`crate::lifecycle`]; anything outside the transition table fails with
/// [`crate::Error::InvalidStatusTransition`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
  Draft,
  InProgress,
  Rejected,
  Recycler,
  Deleted,
  Completed,
}

impl DocumentStatus {
  /// Terminal states admit no further workflow transitions.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Deleted | Self::Completed)
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Pointer to a prior signed artifact in object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPointer {
  pub object_key:   String,
  pub url:          Option<String>,
  pub content_hash: Option<String>,
  pub signed_at:    DateTime<Utc>,
}

/// Storage coordinates and content identity of the current document bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
  /// Object-storage key of the current artifact; opaque to the core.
  pub object_key:   String,
  pub url:          Option<String>,
  pub size:         u64,
  pub mime_type:    String,
  /// SHA-256 hex digest stamped on the artifact ("Envelope ID").
  pub content_hash: Option<String>,
  /// Ordered pointers to prior signed artifacts, oldest first.
  pub artifacts:    Vec<ArtifactPointer>,
}

/// Owner-selected workflow options, fixed at creation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DocumentOptions {
  pub allow_reject:        bool,
  pub remind_every_3_days: bool,
}

// ─── Registration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
  Pending,
  Success,
  Failed,
}

/// Record of anchoring the document's content hash to an external ledger.
/// Written only by the registration coordinator; immutable once `Success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainRegistration {
  pub contract_id:    String,
  pub transaction_id: String,
  pub hash:           String,
  pub network:        String,
  pub registered_at:  DateTime<Utc>,
  pub status:         RegistrationStatus,
  pub attempts:       u32,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// An immutable snapshot of one document at one version. Once written, no
/// field is ever updated; the version chain for a `document_id` is the
/// ordered sequence of its snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
  /// Stable logical id, shared by every version of the document.
  pub document_id:  Uuid,
  /// Strictly increasing, gap-free, starting at 1.
  pub version:      u32,
  pub owner:        String,
  pub status:       DocumentStatus,
  pub participants: Vec<Participant>,
  pub metadata:     DocumentMetadata,
  pub blockchain:   Option<BlockchainRegistration>,
  pub options:      DocumentOptions,
  /// Set when this version was produced by copying an earlier one forward.
  pub is_rollback:  bool,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl DocumentSnapshot {
  /// Build the initial (version 1, `Draft`) snapshot for a new document.
  pub fn initial(
    owner: impl Into<String>,
    metadata: DocumentMetadata,
    options: DocumentOptions,
  ) -> Self {
    let now = Utc::now();
    Self {
      document_id: Uuid::new_v4(),
      version: 1,
      owner: owner.into(),
      status: DocumentStatus::Draft,
      participants: Vec::new(),
      metadata,
      blockchain: None,
      options,
      is_rollback: false,
      created_at: now,
      updated_at: now,
    }
  }

  /// Start building the successor snapshot (`version + 1`), carrying every
  /// field forward unchanged until the builder overrides it.
  pub fn next(&self) -> SnapshotBuilder {
    SnapshotBuilder {
      base:        self.clone(),
      is_rollback: false,
    }
  }

  pub fn participant(&self, id: Uuid) -> Option<&Participant> {
    self.participants.iter().find(|p| p.uuid == id)
  }

  /// Whether a `Success` registration is already recorded.
  pub fn is_registered(&self) -> bool {
    matches!(
      self.blockchain,
      Some(BlockchainRegistration { status: RegistrationStatus::Success, .. })
    )
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Builder for the next version of a document.
///
/// Each `with_*` call names exactly one field that differs from the previous
/// version; everything else is copied forward verbatim. [`Self::build`]
/// assigns `version + 1` and a fresh `updated_at`.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
  base:        DocumentSnapshot,
  is_rollback: bool,
}

impl SnapshotBuilder {
  pub fn with_status(mut self, status: DocumentStatus) -> Self {
    self.base.status = status;
    self
  }

  pub fn with_participants(mut self, participants: Vec<Participant>) -> Self {
    self.base.participants = participants;
    self
  }

  /// Replace a single participant in place, keyed by its stable uuid.
  /// Unknown ids are ignored; callers validate existence beforehand.
  pub fn with_participant(mut self, participant: Participant) -> Self {
    if let Some(slot) = self
      .base
      .participants
      .iter_mut()
      .find(|p| p.uuid == participant.uuid)
    {
      *slot = participant;
    }
    self
  }

  pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
    self.base.metadata = metadata;
    self
  }

  pub fn with_blockchain(
    mut self,
    registration: BlockchainRegistration,
  ) -> Self {
    self.base.blockchain = Some(registration);
    self
  }

  pub fn as_rollback(mut self) -> Self {
    self.is_rollback = true;
    self
  }

  pub fn build(self) -> DocumentSnapshot {
    let mut next = self.base;
    next.version += 1;
    next.is_rollback = self.is_rollback;
    next.updated_at = Utc::now();
    next
  }
}
