//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Snapshots are stored as
//! compact JSON alongside a few denormalized columns for querying. UUIDs are
//! stored as hyphenated lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use signet_core::{
  clients::WorkflowAction,
  document::DocumentSnapshot,
  store::{
    AttemptAction, AuditOutcome, RegistrationAttempt, SigningLink,
    WorkflowAudit,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Registration audit ──────────────────────────────────────────────────────

pub fn encode_action(a: AttemptAction) -> &'static str {
  match a {
    AttemptAction::Attempt => "attempt",
    AttemptAction::Success => "success",
    AttemptAction::Failure => "failure",
    AttemptAction::Cancelled => "cancelled",
  }
}

pub fn decode_action(s: &str) -> Result<AttemptAction> {
  match s {
    "attempt" => Ok(AttemptAction::Attempt),
    "success" => Ok(AttemptAction::Success),
    "failure" => Ok(AttemptAction::Failure),
    "cancelled" => Ok(AttemptAction::Cancelled),
    other => Err(Error::Decode(format!("unknown attempt action: {other:?}"))),
  }
}

// ─── Workflow audit ──────────────────────────────────────────────────────────

pub fn encode_outcome(o: AuditOutcome) -> &'static str {
  match o {
    AuditOutcome::Success => "success",
    AuditOutcome::Failure => "failure",
  }
}

pub fn decode_outcome(s: &str) -> Result<AuditOutcome> {
  match s {
    "success" => Ok(AuditOutcome::Success),
    "failure" => Ok(AuditOutcome::Failure),
    other => Err(Error::Decode(format!("unknown audit outcome: {other:?}"))),
  }
}

pub fn decode_workflow_action(s: &str) -> Result<WorkflowAction> {
  WorkflowAction::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown workflow action: {s:?}")))
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

pub fn encode_snapshot(snapshot: &DocumentSnapshot) -> Result<String> {
  Ok(serde_json::to_string(snapshot)?)
}

pub fn decode_snapshot(s: &str) -> Result<DocumentSnapshot> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `registration_attempts` row.
pub struct RawAttempt {
  pub document_id:    String,
  pub attempt_number: u32,
  pub action:         String,
  pub recorded_at:    String,
  pub hash:           Option<String>,
  pub network:        Option<String>,
  pub error:          Option<String>,
}

impl RawAttempt {
  pub fn into_attempt(self) -> Result<RegistrationAttempt> {
    Ok(RegistrationAttempt {
      document_id:    decode_uuid(&self.document_id)?,
      attempt_number: self.attempt_number,
      action:         decode_action(&self.action)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
      hash:           self.hash,
      network:        self.network,
      error:          self.error,
    })
  }
}

/// Raw strings read directly from a `workflow_audit` row.
pub struct RawEvent {
  pub document_id: Option<String>,
  pub action:      String,
  pub outcome:     String,
  pub detail:      Option<String>,
  pub recorded_at: String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<WorkflowAudit> {
    Ok(WorkflowAudit {
      document_id: self.document_id.as_deref().map(decode_uuid).transpose()?,
      action:      decode_workflow_action(&self.action)?,
      outcome:     decode_outcome(&self.outcome)?,
      detail:      self.detail,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `signer_links` row.
pub struct RawLink {
  pub token:          String,
  pub document_id:    String,
  pub participant_id: String,
  pub expires_at:     String,
}

impl RawLink {
  pub fn into_link(self) -> Result<SigningLink> {
    Ok(SigningLink {
      token:          self.token,
      document_id:    decode_uuid(&self.document_id)?,
      participant_id: decode_uuid(&self.participant_id)?,
      expires_at:     decode_dt(&self.expires_at)?,
    })
  }
}
