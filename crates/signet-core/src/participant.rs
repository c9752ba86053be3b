//! Participants (signers) and their signing history.
//!
//! A participant's `uuid` is stable across document versions; its `status`
//! and `history` evolve as new snapshots are appended. Per-signer transition
//! guards live in [`crate::lifecycle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::SignatureSlot;

// ─── Status ──────────────────────────────────────────────────────────────────

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
pub enum ParticipantStatus {
  /// Pre-pending: the document has not been sent yet.
  WaitingToBeSent,
  Pending,
  Signed,
  Rejected,
}

/// Identity-check kinds a signer may be required to pass before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
  Identity,
  Selfie,
  Phone,
  Email,
}

/// Status of an external identity-validation follow session.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
  #[default]
  NotInitiated,
  Processing,
  Completed,
  Failed,
}

// ─── History ─────────────────────────────────────────────────────────────────

/// One audit-log line in a participant's signing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub at:    DateTime<Utc>,
  pub event: String,
}

/// Append-only record of what a signer did and when.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningHistory {
  pub has_signed:       bool,
  pub has_rejected:     bool,
  pub rejection_reason: Option<String>,
  pub signed_at:        Option<DateTime<Utc>>,
  pub rejected_at:      Option<DateTime<Utc>>,
  pub ip:               Option<String>,
  pub user_agent:       Option<String>,
  /// Cleared when the signer rejects; restored only by an explicit re-sign.
  pub can_sign:         bool,
  /// Start of the current signing round. Slot renditions recorded before
  /// this instant do not count toward fulfilment.
  pub round_started_at: Option<DateTime<Utc>>,
  pub audit_log:        Vec<AuditEntry>,
}

impl SigningHistory {
  pub fn log(&mut self, event: impl Into<String>) {
    self.audit_log.push(AuditEntry { at: Utc::now(), event: event.into() });
  }
}

// ─── Participant ─────────────────────────────────────────────────────────────

/// A party required to act on a document (sign or reject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
  /// Stable across versions of the document.
  pub uuid:               Uuid,
  pub first_name:         String,
  pub last_name:          String,
  pub email:              String,
  pub phone:              Option<String>,
  /// Signing order as shown in the editor; not enforced by the core.
  pub order:              u32,
  pub require_validation: bool,
  pub validation_kinds:   Vec<ValidationKind>,
  pub status:             ParticipantStatus,
  pub slots:              Vec<SignatureSlot>,
  pub history:            SigningHistory,
  /// Token reference of the allocated signing URL, if any.
  pub signer_link:        Option<String>,
  pub follow_id:          Option<String>,
  pub follow_url:         Option<String>,
  pub follow_status:      FollowStatus,
}

impl Participant {
  /// Create a participant in the pre-pending state with no slots.
  pub fn new(
    first_name: impl Into<String>,
    last_name: impl Into<String>,
    email: impl Into<String>,
    order: u32,
  ) -> Self {
    Self {
      uuid: Uuid::new_v4(),
      first_name: first_name.into(),
      last_name: last_name.into(),
      email: email.into(),
      phone: None,
      order,
      require_validation: false,
      validation_kinds: Vec::new(),
      status: ParticipantStatus::WaitingToBeSent,
      slots: Vec::new(),
      history: SigningHistory { can_sign: true, ..Default::default() },
      signer_link: None,
      follow_id: None,
      follow_url: None,
      follow_status: FollowStatus::default(),
    }
  }

  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  /// Whether every slot owned by this participant gained a rendition in the
  /// current signing round.
  pub fn all_slots_fulfilled(&self) -> bool {
    let since = self.history.round_started_at;
    !self.slots.is_empty()
      && self.slots.iter().all(|slot| slot.fulfilled_since(since))
  }
}
