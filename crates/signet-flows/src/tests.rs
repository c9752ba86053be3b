//! End-to-end flow tests against an in-memory `SqliteStore` and fake
//! collaborators.

use std::{
  sync::{
    atomic::{AtomicU32, Ordering},
    Mutex,
  },
  time::Duration,
};

use chrono::Utc;
use signet_core::{
  clients::{
    EmailPayload, FollowSession, FollowState, IdentityValidation,
    LedgerClient, LedgerReceipt, MessageQueue, Notifier, ObjectStorage,
    QueueEnvelope, StoredObject, WorkflowAction,
  },
  document::{
    DocumentMetadata, DocumentOptions, DocumentSnapshot, DocumentStatus,
  },
  participant::{FollowStatus, Participant, ParticipantStatus},
  retry::RetryPolicy,
  signature::{Placement, SignatureContent, SignatureSlot, SlotRendition},
  store::{AttemptAction, VersionStore},
  Error as CoreError, Result as CoreResult,
};
use signet_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  draft, recycle, register::RegistrationCoordinator, reject, resign, send,
  sign::{self, SigningEvent},
  Error,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Identity provider whose every session polls to a fixed status.
struct StaticValidation(FollowStatus);

impl IdentityValidation for StaticValidation {
  async fn start_follow(
    &self,
    participant: &Participant,
  ) -> CoreResult<FollowSession> {
    Ok(FollowSession {
      follow_id: format!("follow-{}", participant.uuid.simple()),
      url:       "https://validate.local/session".into(),
    })
  }

  async fn follow_status(&self, _follow_id: &str) -> CoreResult<FollowState> {
    Ok(FollowState { status: self.0, validated_at: Some(Utc::now()) })
  }
}

#[derive(Default)]
struct RecordingQueue {
  published: Mutex<Vec<(String, QueueEnvelope)>>,
}

impl MessageQueue for RecordingQueue {
  async fn receive(
    &self,
    _max: usize,
  ) -> CoreResult<Vec<(String, QueueEnvelope)>> {
    Ok(Vec::new())
  }

  async fn acknowledge(&self, _receipt: &str) -> CoreResult<()> { Ok(()) }

  async fn publish(
    &self,
    queue: &str,
    envelope: QueueEnvelope,
  ) -> CoreResult<()> {
    self.published.lock().unwrap().push((queue.to_string(), envelope));
    Ok(())
  }
}

#[derive(Default)]
struct RecordingNotifier {
  notices: Mutex<Vec<serde_json::Value>>,
  emails:  Mutex<Vec<EmailPayload>>,
}

impl Notifier for RecordingNotifier {
  async fn notify(
    &self,
    _user_id: &str,
    payload: serde_json::Value,
  ) -> CoreResult<()> {
    self.notices.lock().unwrap().push(payload);
    Ok(())
  }

  async fn send_email(&self, payload: &EmailPayload) -> CoreResult<()> {
    self.emails.lock().unwrap().push(payload.clone());
    Ok(())
  }
}

#[derive(Default)]
struct RecordingStorage {
  deleted: Mutex<Vec<String>>,
}

impl ObjectStorage for RecordingStorage {
  async fn upload(
    &self,
    bytes: Vec<u8>,
    _content_type: &str,
  ) -> CoreResult<StoredObject> {
    Ok(StoredObject { key: format!("obj/{}", bytes.len()), url: None })
  }

  async fn download(&self, _key: &str) -> CoreResult<Vec<u8>> {
    Ok(Vec::new())
  }

  async fn presigned_url(
    &self,
    key: &str,
    _ttl: Duration,
  ) -> CoreResult<String> {
    Ok(format!("https://storage.local/{key}"))
  }

  async fn delete(&self, key: &str) -> CoreResult<()> {
    self.deleted.lock().unwrap().push(key.to_string());
    Ok(())
  }
}

/// Ledger that fails the first `n` calls, then succeeds.
struct FlakyLedger {
  failures: AtomicU32,
}

impl FlakyLedger {
  fn reliable() -> Self { Self::failing(0) }

  fn failing(n: u32) -> Self { Self { failures: AtomicU32::new(n) } }
}

impl LedgerClient for FlakyLedger {
  async fn send_transaction(&self, hash: &str) -> CoreResult<LedgerReceipt> {
    if self.failures.load(Ordering::SeqCst) > 0 {
      self.failures.fetch_sub(1, Ordering::SeqCst);
      return Err(CoreError::ServiceUnavailable(
        "ledger gateway timed out".into(),
      ));
    }
    Ok(LedgerReceipt {
      contract_id:    "contract-0.0.7".into(),
      transaction_id: format!("tx-{}", &hash[..8]),
      network:        "testnet".into(),
      timestamp:      Utc::now(),
    })
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn metadata() -> DocumentMetadata {
  DocumentMetadata {
    object_key:   "docs/contract.pdf".into(),
    url:          None,
    size:         2048,
    mime_type:    "application/pdf".into(),
    content_hash: None,
    artifacts:    Vec::new(),
  }
}

fn placement() -> Placement {
  Placement {
    slide_index: 0,
    top:         0.5,
    left:        0.5,
    width:       200.0,
    height:      66.0,
    rotation:    0.0,
  }
}

fn rendition() -> SlotRendition {
  SlotRendition {
    content:       SignatureContent::Image { object_key: "sig/a.png".into() },
    canvas_width:  1000.0,
    canvas_height: 1000.0,
    created_at:    Utc::now(),
  }
}

fn draft_with_signers(count: u32) -> DocumentSnapshot {
  let mut snap = DocumentSnapshot::initial("owner-1", metadata(), DocumentOptions {
    allow_reject:        true,
    remind_every_3_days: false,
  });
  for i in 0..count {
    let mut p = Participant::new(
      "Signer",
      format!("{i}"),
      format!("signer{i}@example.com"),
      i + 1,
    );
    p.slots.push(SignatureSlot::new(p.uuid, placement()));
    snap.participants.push(p);
  }
  snap
}

/// Seed a document already signed by everyone, ready for registration.
async fn seeded_completed(s: &SqliteStore) -> DocumentSnapshot {
  let mut snap = draft_with_signers(1);
  snap.metadata.content_hash = Some("ab".repeat(32));
  snap.status = DocumentStatus::Completed;
  for p in &mut snap.participants {
    p.status = ParticipantStatus::Signed;
    p.history.has_signed = true;
  }
  s.append_version(snap.clone()).await.unwrap()
}

fn instant_policy() -> RetryPolicy {
  RetryPolicy {
    max_attempts: 3,
    delay:        Duration::ZERO,
    jitter:       Duration::ZERO,
  }
}

// ─── Draft roster ────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_roster_edit_appends_a_version() {
  let s = store().await;
  let created = draft::create(
    &s,
    "owner-1",
    metadata(),
    DocumentOptions::default(),
  )
  .await
  .unwrap();
  let doc = created.document_id;
  assert_eq!(created.version, 1);

  let mut ada = Participant::new("Ada", "Lovelace", "ada@example.com", 1);
  ada.slots.push(SignatureSlot::new(ada.uuid, placement()));
  let with_ada = draft::add_signer(&s, doc, Some("owner-1"), ada.clone())
    .await
    .unwrap();
  assert_eq!(with_ada.version, 2);
  assert_eq!(with_ada.participants.len(), 1);

  ada.email = "countess@example.com".into();
  let updated = draft::update_signer(&s, doc, Some("owner-1"), ada.clone())
    .await
    .unwrap();
  assert_eq!(updated.version, 3);
  assert_eq!(updated.participants[0].email, "countess@example.com");

  let removed = draft::remove_signer(&s, doc, Some("owner-1"), ada.uuid)
    .await
    .unwrap();
  assert_eq!(removed.version, 4);
  assert!(removed.participants.is_empty());
}

#[tokio::test]
async fn roster_edits_are_refused_once_sent() {
  let s = store().await;
  let snap = draft_with_signers(1);
  let doc = snap.document_id;
  s.append_version(snap).await.unwrap();

  send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    doc,
    "owner-1",
  )
  .await
  .unwrap();

  let late = Participant::new("Late", "Arrival", "late@example.com", 2);
  let err = draft::add_signer(&s, doc, None, late).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn unknown_signer_cannot_be_updated_or_removed() {
  let s = store().await;
  let snap = draft_with_signers(1);
  let doc = snap.document_id;
  s.append_version(snap).await.unwrap();

  let ghost = Participant::new("No", "Body", "nobody@example.com", 9);
  let err = draft::update_signer(&s, doc, None, ghost.clone())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::ParticipantNotFound(_))
  ));

  let err = draft::remove_signer(&s, doc, None, ghost.uuid)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::ParticipantNotFound(_))
  ));
}

// ─── Send ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_marks_every_signer_pending() {
  let s = store().await;
  let draft = draft_with_signers(2);
  s.append_version(draft.clone()).await.unwrap();

  let notifier = RecordingNotifier::default();
  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &notifier,
    draft.document_id,
    "owner-1",
  )
  .await
  .unwrap();

  assert_eq!(sent.version, 2);
  assert_eq!(sent.status, DocumentStatus::InProgress);
  for p in &sent.participants {
    assert_eq!(p.status, ParticipantStatus::Pending);
    assert!(p.history.can_sign);
    assert!(p.history.round_started_at.is_some());

    let token = p.signer_link.as_deref().expect("signing link allocated");
    let link = s.resolve_signing_link(token).await.unwrap().unwrap();
    assert_eq!(link.participant_id, p.uuid);
  }
  assert_eq!(notifier.emails.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn send_starts_validation_sessions_where_required() {
  let s = store().await;
  let mut draft = draft_with_signers(2);
  draft.participants[0].require_validation = true;
  s.append_version(draft.clone()).await.unwrap();

  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    draft.document_id,
    "owner-1",
  )
  .await
  .unwrap();

  let validated = &sent.participants[0];
  assert!(validated.follow_id.is_some());
  assert!(validated.follow_url.is_some());
  assert_eq!(validated.follow_status, FollowStatus::Processing);

  let plain = &sent.participants[1];
  assert!(plain.follow_id.is_none());
  assert_eq!(plain.follow_status, FollowStatus::NotInitiated);
}

#[tokio::test]
async fn send_without_slots_is_rejected() {
  let s = store().await;
  let mut draft = draft_with_signers(1);
  draft.participants[0].slots.clear();
  s.append_version(draft.clone()).await.unwrap();

  let err = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    draft.document_id,
    "owner-1",
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));

  // Nothing was appended.
  let latest = s.latest(draft.document_id, None).await.unwrap().unwrap();
  assert_eq!(latest.version, 1);
}

#[tokio::test]
async fn send_is_owner_scoped() {
  let s = store().await;
  let draft = draft_with_signers(1);
  s.append_version(draft.clone()).await.unwrap();

  let err = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    draft.document_id,
    "intruder",
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DocumentNotFound(_))));
}

// ─── Sign ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_signing_round_completes_the_document() {
  let s = store().await;
  let draft = draft_with_signers(2);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let validation = StaticValidation(FollowStatus::Completed);
  let queue = RecordingQueue::default();
  let sent = send::send(&s, &validation, &RecordingNotifier::default(), doc, "owner-1")
    .await
    .unwrap();

  let first = sent.participants[0].clone();
  let second = sent.participants[1].clone();

  sign::record_rendition(&s, doc, first.uuid, first.slots[0].id, rendition())
    .await
    .unwrap();
  let after_first =
    sign::sign(&s, &validation, &queue, doc, first.uuid, SigningEvent {
      ip:         Some("203.0.113.9".into()),
      user_agent: Some("integration-test".into()),
    })
    .await
    .unwrap();
  assert_eq!(after_first.status, DocumentStatus::InProgress);
  assert!(queue.published.lock().unwrap().is_empty());

  sign::record_rendition(&s, doc, second.uuid, second.slots[0].id, rendition())
    .await
    .unwrap();
  let done =
    sign::sign(&s, &validation, &queue, doc, second.uuid, SigningEvent::default())
      .await
      .unwrap();
  assert_eq!(done.status, DocumentStatus::Completed);
  assert!(done
    .participants
    .iter()
    .all(|p| p.status == ParticipantStatus::Signed));

  // Completion queues exactly one finalize workflow.
  let published = queue.published.lock().unwrap();
  assert_eq!(published.len(), 1);
  let (queue_name, envelope) = &published[0];
  assert_eq!(queue_name, "workflow");
  assert_eq!(envelope.action, WorkflowAction::FinalizeSignatureRecord);
  assert_eq!(envelope.document_id, Some(doc));
  assert_eq!(envelope.user_id.as_deref(), Some("owner-1"));

  // And revokes every signing link.
  let token = first.signer_link.as_deref().unwrap();
  assert!(s.resolve_signing_link(token).await.unwrap().is_none());
}

#[tokio::test]
async fn sign_without_rendition_fails() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let validation = StaticValidation(FollowStatus::Completed);
  let sent = send::send(&s, &validation, &RecordingNotifier::default(), doc, "owner-1")
    .await
    .unwrap();

  let err = sign::sign(
    &s,
    &validation,
    &RecordingQueue::default(),
    doc,
    sent.participants[0].uuid,
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn sign_refreshes_validation_state_before_the_guard() {
  let s = store().await;
  let mut draft = draft_with_signers(1);
  draft.participants[0].require_validation = true;
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  // At send time the session is still processing.
  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    doc,
    "owner-1",
  )
  .await
  .unwrap();
  let signer = sent.participants[0].clone();
  assert_eq!(signer.follow_status, FollowStatus::Processing);

  sign::record_rendition(&s, doc, signer.uuid, signer.slots[0].id, rendition())
    .await
    .unwrap();

  // A provider still reporting `Processing` blocks the signature.
  let err = sign::sign(
    &s,
    &StaticValidation(FollowStatus::Processing),
    &RecordingQueue::default(),
    doc,
    signer.uuid,
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));

  // Once the provider reports `Completed`, the stale stored status does not
  // bounce the signer.
  let done = sign::sign(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingQueue::default(),
    doc,
    signer.uuid,
    SigningEvent::default(),
  )
  .await
  .unwrap();
  assert_eq!(done.status, DocumentStatus::Completed);
  assert_eq!(
    done.participants[0].follow_status,
    FollowStatus::Completed
  );
}

#[tokio::test]
async fn unknown_participant_cannot_sign() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let validation = StaticValidation(FollowStatus::Completed);
  send::send(&s, &validation, &RecordingNotifier::default(), doc, "owner-1")
    .await
    .unwrap();

  let err = sign::sign(
    &s,
    &validation,
    &RecordingQueue::default(),
    doc,
    Uuid::new_v4(),
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::ParticipantNotFound(_))));
}

// ─── Reject / re-sign ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_rejection_moves_the_document_to_rejected() {
  let s = store().await;
  let draft = draft_with_signers(2);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let validation = StaticValidation(FollowStatus::Completed);
  let notifier = RecordingNotifier::default();
  let sent = send::send(&s, &validation, &notifier, doc, "owner-1")
    .await
    .unwrap();
  let rejecting = sent.participants[0].clone();
  let other = sent.participants[1].clone();

  let rejected = reject::reject(
    &s,
    &notifier,
    doc,
    rejecting.uuid,
    Some("wrong payment terms".into()),
    SigningEvent::default(),
  )
  .await
  .unwrap();

  assert_eq!(rejected.status, DocumentStatus::Rejected);
  let p = rejected.participant(rejecting.uuid).unwrap();
  assert_eq!(p.status, ParticipantStatus::Rejected);
  assert!(!p.history.can_sign);
  assert_eq!(
    p.history.rejection_reason.as_deref(),
    Some("wrong payment terms")
  );

  // The sibling keeps its state but can no longer sign the dead document.
  assert_eq!(
    rejected.participant(other.uuid).unwrap().status,
    ParticipantStatus::Pending
  );
  sign::record_rendition(&s, doc, other.uuid, other.slots[0].id, rendition())
    .await
    .unwrap();
  let err = sign::sign(
    &s,
    &validation,
    &RecordingQueue::default(),
    doc,
    other.uuid,
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));

  // The owner was told.
  let notices = notifier.notices.lock().unwrap();
  assert_eq!(notices.len(), 1);
  assert_eq!(notices[0]["event"], "document_rejected");
}

#[tokio::test]
async fn rejection_respects_the_document_option() {
  let s = store().await;
  let mut draft = draft_with_signers(1);
  draft.options.allow_reject = false;
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let notifier = RecordingNotifier::default();
  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &notifier,
    doc,
    "owner-1",
  )
  .await
  .unwrap();

  let err = reject::reject(
    &s,
    &notifier,
    doc,
    sent.participants[0].uuid,
    None,
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
  assert!(notifier.notices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resign_reopens_a_rejected_round() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let validation = StaticValidation(FollowStatus::Completed);
  let notifier = RecordingNotifier::default();
  let sent = send::send(&s, &validation, &notifier, doc, "owner-1")
    .await
    .unwrap();
  let signer = sent.participants[0].clone();

  sign::record_rendition(&s, doc, signer.uuid, signer.slots[0].id, rendition())
    .await
    .unwrap();
  reject::reject(&s, &notifier, doc, signer.uuid, None, SigningEvent::default())
    .await
    .unwrap();

  let reopened = resign::resign(&s, doc, signer.uuid).await.unwrap();
  assert_eq!(reopened.status, DocumentStatus::InProgress);
  let p = reopened.participant(signer.uuid).unwrap();
  assert_eq!(p.status, ParticipantStatus::Pending);
  assert!(p.history.can_sign);

  // A fresh link was allocated and stored.
  let token = p.signer_link.as_deref().unwrap();
  assert_ne!(Some(token), signer.signer_link.as_deref());
  let link = s.resolve_signing_link(token).await.unwrap().unwrap();
  assert_eq!(link.participant_id, signer.uuid);

  // Content recorded before the rejection does not carry over; the reopened
  // round needs a fresh rendition.
  let err = sign::sign(
    &s,
    &validation,
    &RecordingQueue::default(),
    doc,
    signer.uuid,
    SigningEvent::default(),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn resign_is_refused_on_a_completed_document() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let signer = snap.participants[0].uuid;

  let err = resign::resign(&s, snap.document_id, signer).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::InvalidStatusTransition { .. })
  ));

  // The terminal document gained no version.
  let latest = s.latest(snap.document_id, None).await.unwrap().unwrap();
  assert_eq!(latest.version, snap.version);
  assert_eq!(
    latest.participants[0].status,
    ParticipantStatus::Signed
  );
}

// ─── Recycler ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recycle_and_restore_a_draft() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let binned = recycle::recycle(&s, doc, Some("owner-1")).await.unwrap();
  assert_eq!(binned.status, DocumentStatus::Recycler);

  let restored = recycle::restore(&s, doc, Some("owner-1")).await.unwrap();
  assert_eq!(restored.status, DocumentStatus::Draft);
  assert_eq!(restored.version, 3);
}

#[tokio::test]
async fn restore_returns_a_rejected_document_to_rejected() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let notifier = RecordingNotifier::default();
  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &notifier,
    doc,
    "owner-1",
  )
  .await
  .unwrap();
  reject::reject(
    &s,
    &notifier,
    doc,
    sent.participants[0].uuid,
    None,
    SigningEvent::default(),
  )
  .await
  .unwrap();

  recycle::recycle(&s, doc, None).await.unwrap();
  let restored = recycle::restore(&s, doc, None).await.unwrap();
  assert_eq!(restored.status, DocumentStatus::Rejected);
}

#[tokio::test]
async fn permanent_delete_requires_the_recycler() {
  let s = store().await;
  let storage = RecordingStorage::default();
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let err = recycle::delete_permanently(&s, &storage, doc, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::InvalidStatusTransition { .. })
  ));
  assert!(storage.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn permanent_delete_cleans_up_artifacts_and_links() {
  let s = store().await;
  let storage = RecordingStorage::default();
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();

  let sent = send::send(
    &s,
    &StaticValidation(FollowStatus::Completed),
    &RecordingNotifier::default(),
    doc,
    "owner-1",
  )
  .await
  .unwrap();
  let token = sent.participants[0].signer_link.clone().unwrap();

  recycle::recycle(&s, doc, None).await.unwrap();
  let gone = recycle::delete_permanently(&s, &storage, doc, None)
    .await
    .unwrap();
  assert_eq!(gone.status, DocumentStatus::Deleted);

  let deleted = storage.deleted.lock().unwrap();
  assert!(deleted.contains(&"docs/contract.pdf".to_string()));
  assert!(s.resolve_signing_link(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn rollback_appends_a_copy_without_rewriting_history() {
  let s = store().await;
  let draft = draft_with_signers(1);
  let doc = draft.document_id;
  s.append_version(draft).await.unwrap();
  recycle::recycle(&s, doc, None).await.unwrap();

  let rolled = recycle::rollback(&s, doc, 1).await.unwrap();
  assert_eq!(rolled.version, 3);
  assert_eq!(rolled.status, DocumentStatus::Draft);
  assert!(rolled.is_rollback);

  let all = s.all_versions(doc).await.unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(all[1].status, DocumentStatus::Recycler);
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn registration_succeeds_and_leaves_an_audit_trail() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let ledger = FlakyLedger::reliable();

  let registered = RegistrationCoordinator::new(&s, &ledger)
    .with_policy(instant_policy())
    .with_network("testnet")
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap();

  assert!(registered.is_registered());
  let reg = registered.blockchain.as_ref().unwrap();
  assert_eq!(reg.attempts, 1);
  assert_eq!(reg.network, "testnet");
  assert_eq!(Some(&reg.hash), snap.metadata.content_hash.as_ref());

  let rows = s.registration_attempts(snap.document_id).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].action, AttemptAction::Attempt);
  assert_eq!(rows[1].action, AttemptAction::Success);
  // Every row names the network, not just the receipt-bearing one.
  assert!(rows.iter().all(|r| r.network.as_deref() == Some("testnet")));
}

#[tokio::test]
async fn registration_retries_transient_failures() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let ledger = FlakyLedger::failing(2);

  let registered = RegistrationCoordinator::new(&s, &ledger)
    .with_policy(instant_policy())
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(registered.blockchain.as_ref().unwrap().attempts, 3);

  let rows = s.registration_attempts(snap.document_id).await.unwrap();
  let actions: Vec<_> = rows.iter().map(|r| r.action).collect();
  assert_eq!(actions, vec![
    AttemptAction::Attempt,
    AttemptAction::Failure,
    AttemptAction::Attempt,
    AttemptAction::Failure,
    AttemptAction::Attempt,
    AttemptAction::Success,
  ]);
}

#[tokio::test]
async fn registration_gives_up_after_exhausting_attempts() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let ledger = FlakyLedger::failing(3);
  let coordinator =
    RegistrationCoordinator::new(&s, &ledger).with_policy(instant_policy());

  let err = coordinator
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::RegistrationUnavailable { attempts: 3 })
  ));

  // No registration committed, every attempt audited.
  let latest = s.latest(snap.document_id, None).await.unwrap().unwrap();
  assert!(latest.blockchain.is_none());
  let rows = s.registration_attempts(snap.document_id).await.unwrap();
  assert_eq!(
    rows.iter().filter(|r| r.action == AttemptAction::Attempt).count(),
    3
  );
  assert_eq!(
    rows.iter().filter(|r| r.action == AttemptAction::Failure).count(),
    3
  );
  assert!(!rows.iter().any(|r| r.action == AttemptAction::Success));

  // The exhausted run left the document registrable; a later run succeeds.
  let registered = coordinator
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap();
  assert!(registered.is_registered());
}

#[tokio::test]
async fn second_registration_is_rejected() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let ledger = FlakyLedger::reliable();
  let coordinator =
    RegistrationCoordinator::new(&s, &ledger).with_policy(instant_policy());

  coordinator
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap();
  let err = coordinator
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyRegistered(_))));
}

#[tokio::test]
async fn registration_requires_a_content_hash() {
  let s = store().await;
  let mut snap = draft_with_signers(1);
  snap.status = DocumentStatus::Completed;
  for p in &mut snap.participants {
    p.status = ParticipantStatus::Signed;
  }
  s.append_version(snap.clone()).await.unwrap();

  let ledger = FlakyLedger::reliable();
  let err = RegistrationCoordinator::new(&s, &ledger)
    .with_policy(instant_policy())
    .register(snap.document_id, &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
}

#[tokio::test]
async fn cancelled_registration_records_the_cancellation() {
  let s = store().await;
  let snap = seeded_completed(&s).await;
  let ledger = FlakyLedger::reliable();

  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = RegistrationCoordinator::new(&s, &ledger)
    .with_policy(instant_policy())
    .register(snap.document_id, &cancel)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Cancelled(id) if id == snap.document_id));

  let rows = s.registration_attempts(snap.document_id).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].action, AttemptAction::Cancelled);

  let latest = s.latest(snap.document_id, None).await.unwrap().unwrap();
  assert!(latest.blockchain.is_none());
}
