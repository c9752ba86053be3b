//! Traits for the external collaborators Signet talks to.
//!
//! Each trait covers one side-effect boundary: object storage for PDF bytes
//! and signature images, the workflow queue, identity validation, the
//! blockchain ledger, and notifications. Clients are constructed once at
//! process start and injected; there is no ambient global state. Production
//! adapters live in `signet-worker`; tests substitute in-memory fakes.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::participant::{FollowStatus, Participant};

// ─── Object storage ──────────────────────────────────────────────────────────

/// Where an uploaded object landed.
#[derive(Debug, Clone)]
pub struct StoredObject {
  pub key: String,
  pub url: Option<String>,
}

/// Blob storage for source PDFs, signature images and generated artifacts.
/// Keys are opaque to callers.
pub trait ObjectStorage: Send + Sync {
  fn upload<'a>(
    &'a self,
    bytes: Vec<u8>,
    content_type: &'a str,
  ) -> impl Future<Output = crate::Result<StoredObject>> + Send + 'a;

  fn download<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = crate::Result<Vec<u8>>> + Send + 'a;

  fn presigned_url<'a>(
    &'a self,
    key: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = crate::Result<String>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;
}

// ─── Workflow queue ──────────────────────────────────────────────────────────

/// Closed set of workflow actions the queue consumer dispatches on. An
/// envelope whose action is outside this set fails to decode and is
/// rejected, never partially handled.
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
pub enum WorkflowAction {
  /// Soft-delete: move the document to the recycler.
  Delete,
  /// Hard-delete a recycled document and its artifacts.
  DeletePermanently,
  /// Restore a recycled document to a workable status.
  Restore,
  DeleteContact,
  SendEmail,
  /// Stamp signatures, build the annex, and register on the ledger.
  FinalizeSignatureRecord,
}

/// One message on the workflow queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEnvelope {
  pub action:      WorkflowAction,
  pub document_id: Option<Uuid>,
  /// Owner scope for access-controlled lookups.
  pub user_id:     Option<String>,
  pub data_email:  Option<EmailPayload>,
  pub timestamp:   DateTime<Utc>,
}

/// Payload of a `SendEmail` action and of [`Notifier::send_email`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
  pub from:    String,
  pub to:      String,
  pub subject: String,
  pub text:    String,
  pub html:    Option<String>,
}

/// The workflow queue. Receiving yields at most `max` envelopes paired with
/// their delivery receipts; acknowledging removes a delivered message for
/// good; publishing chains follow-up workflows.
pub trait MessageQueue: Send + Sync {
  fn receive(
    &self,
    max: usize,
  ) -> impl Future<Output = crate::Result<Vec<(String, QueueEnvelope)>>> + Send + '_;

  fn acknowledge<'a>(
    &'a self,
    receipt: &'a str,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;

  fn publish<'a>(
    &'a self,
    queue: &'a str,
    envelope: QueueEnvelope,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;
}

// ─── Identity validation ─────────────────────────────────────────────────────

/// A started validation session at the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowSession {
  pub follow_id: String,
  pub url:       String,
}

/// Polled state of a validation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowState {
  pub status:       FollowStatus,
  pub validated_at: Option<DateTime<Utc>>,
}

/// External identity-validation provider.
pub trait IdentityValidation: Send + Sync {
  /// Start a validation session for a signer; the returned URL is where the
  /// signer completes the checks.
  fn start_follow<'a>(
    &'a self,
    participant: &'a Participant,
  ) -> impl Future<Output = crate::Result<FollowSession>> + Send + 'a;

  fn follow_status<'a>(
    &'a self,
    follow_id: &'a str,
  ) -> impl Future<Output = crate::Result<FollowState>> + Send + 'a;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// What a successful on-chain registration returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
  pub contract_id:    String,
  pub transaction_id: String,
  pub network:        String,
  pub timestamp:      DateTime<Utc>,
}

/// The blockchain registration service. Calls are assumed transient-failure
/// prone; callers wrap them in a [`crate::retry::RetryPolicy`].
pub trait LedgerClient: Send + Sync {
  /// Anchor `hash` (hex SHA-256 of the final PDF) on chain.
  fn send_transaction<'a>(
    &'a self,
    hash: &'a str,
  ) -> impl Future<Output = crate::Result<LedgerReceipt>> + Send + 'a;
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// Outbound notifications. Fire-and-forget: failures here are logged and
/// swallowed by callers; a lost notification never rolls back a committed
/// snapshot.
pub trait Notifier: Send + Sync {
  fn notify<'a>(
    &'a self,
    user_id: &'a str,
    payload: serde_json::Value,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;

  fn send_email<'a>(
    &'a self,
    payload: &'a EmailPayload,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;
}
