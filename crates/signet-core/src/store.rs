//! The `VersionStore` trait and supporting record types.
//!
//! The trait is implemented by storage backends (e.g. `signet-store-sqlite`).
//! Higher layers (`signet-flows`, `signet-worker`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentSnapshot;

// ─── Registration audit ──────────────────────────────────────────────────────

/// What a registration-attempt audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptAction {
  Attempt,
  Success,
  Failure,
  Cancelled,
}

/// One immutable audit row written by the registration coordinator.
/// These rows persist even when the registration itself never commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationAttempt {
  pub document_id:    Uuid,
  pub attempt_number: u32,
  pub action:         AttemptAction,
  pub recorded_at:    DateTime<Utc>,
  pub hash:           Option<String>,
  pub network:        Option<String>,
  pub error:          Option<String>,
}

// ─── Workflow audit ──────────────────────────────────────────────────────────

/// Outcome of one handled workflow message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
  Success,
  Failure,
}

/// One row the workflow consumer writes per handled message, success or
/// failure. Append-only, like the registration audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowAudit {
  pub document_id: Option<Uuid>,
  pub action:      crate::clients::WorkflowAction,
  pub outcome:     AuditOutcome,
  pub detail:      Option<String>,
  pub recorded_at: DateTime<Utc>,
}

/// Append-only log of workflow-message outcomes.
pub trait AuditLog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn record_workflow_event(
    &self,
    event: WorkflowAudit,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Events for a document, in recording order.
  fn workflow_events(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<WorkflowAudit>, Self::Error>> + Send + '_;
}

// ─── Signing links ───────────────────────────────────────────────────────────

/// Ephemeral signing-URL token bound to one participant of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningLink {
  pub token:          String,
  pub document_id:    Uuid,
  pub participant_id: Uuid,
  pub expires_at:     DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Signet version-chain backend.
///
/// All snapshot writes are append-only: no method ever mutates an existing
/// version row. Version numbers per `document_id` are strictly increasing and
/// gap-free; [`VersionStore::append_version`] must be atomic so two
/// concurrent writers cannot both claim the same version (the loser observes
/// a conflict and re-reads).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait VersionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether `error` is the append-version conflict signal. Callers use this
  /// to decide between re-reading and propagating.
  fn is_conflict(error: &Self::Error) -> bool;

  // ── Version chain ─────────────────────────────────────────────────────

  /// Persist `snapshot` as the next version of its document.
  ///
  /// The snapshot's `version` must equal `current_max + 1` at commit time;
  /// otherwise the append fails with a conflict and nothing is written.
  fn append_version(
    &self,
    snapshot: DocumentSnapshot,
  ) -> impl Future<Output = Result<DocumentSnapshot, Self::Error>> + Send + '_;

  /// The maximal-version snapshot for `document_id`, optionally scoped to an
  /// owner for access control. `None` when unknown (or owned by another).
  fn latest<'a>(
    &'a self,
    document_id: Uuid,
    owner: Option<&'a str>,
  ) -> impl Future<Output = Result<Option<DocumentSnapshot>, Self::Error>> + Send + 'a;

  fn version(
    &self,
    document_id: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<Option<DocumentSnapshot>, Self::Error>> + Send + '_;

  /// All versions for `document_id`, descending by version.
  fn all_versions(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DocumentSnapshot>, Self::Error>> + Send + '_;

  /// Append a new version whose fields equal `target_version`'s, marked as a
  /// rollback. History is never overwritten.
  fn rollback(
    &self,
    document_id: Uuid,
    target_version: u32,
  ) -> impl Future<Output = Result<DocumentSnapshot, Self::Error>> + Send + '_;

  // ── Registration audit ────────────────────────────────────────────────

  fn record_registration_attempt(
    &self,
    attempt: RegistrationAttempt,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Attempt rows for a document, in recording order.
  fn registration_attempts(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RegistrationAttempt>, Self::Error>> + Send + '_;

  // ── Signing links ─────────────────────────────────────────────────────

  fn put_signing_link(
    &self,
    link: SigningLink,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a token to its link. Expired tokens resolve to `None`.
  fn resolve_signing_link<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<SigningLink>, Self::Error>> + Send + 'a;

  /// Drop every link for a document (e.g. on delete or completion).
  fn revoke_signing_links(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
