//! The workflow queue consumer.
//!
//! Polls the queue in batches, dispatches each envelope to its handler under
//! a bounded concurrency limit, and writes one audit row per message. A
//! handler failure is logged and the message left unacknowledged; the
//! broker's redelivery policy governs retries. One message's failure never
//! aborts its siblings.

use std::sync::Arc;

use chrono::Utc;
use signet_core::{
  clients::{
    LedgerClient, MessageQueue, Notifier, ObjectStorage, QueueEnvelope,
    WorkflowAction,
  },
  document::{ArtifactPointer, DocumentSnapshot, DocumentStatus},
  participant::{Participant, ValidationKind},
  signature::SignatureContent,
  store::{AuditLog, AuditOutcome, VersionStore, WorkflowAudit},
  Error as CoreError,
};
use signet_flows::{chain, recycle, register::RegistrationCoordinator};
use signet_pdf::{
  annex::{wrap_text, AnnexContext, ParticipantCard, ValidationItem},
  SignatureArt, SignatureAsset, SignaturePlacementEngine,
};
use tokio::{sync::Semaphore, task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::WorkerConfig, Error, Result};

// ─── Consumer ────────────────────────────────────────────────────────────────

pub struct WorkflowConsumer<S, O, Q, L, N> {
  store:    S,
  storage:  Arc<O>,
  queue:    Arc<Q>,
  ledger:   Arc<L>,
  notifier: Arc<N>,
  engine:   Arc<SignaturePlacementEngine>,
  config:   Arc<WorkerConfig>,
  limiter:  Arc<Semaphore>,
  cancel:   CancellationToken,
}

impl<S: Clone, O, Q, L, N> Clone for WorkflowConsumer<S, O, Q, L, N> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      storage:  Arc::clone(&self.storage),
      queue:    Arc::clone(&self.queue),
      ledger:   Arc::clone(&self.ledger),
      notifier: Arc::clone(&self.notifier),
      engine:   Arc::clone(&self.engine),
      config:   Arc::clone(&self.config),
      limiter:  Arc::clone(&self.limiter),
      cancel:   self.cancel.clone(),
    }
  }
}

impl<S, O, Q, L, N> WorkflowConsumer<S, O, Q, L, N>
where
  S: VersionStore + AuditLog + Clone + Send + Sync + 'static,
  O: ObjectStorage + Send + Sync + 'static,
  Q: MessageQueue + Send + Sync + 'static,
  L: LedgerClient + Send + Sync + 'static,
  N: Notifier + Send + Sync + 'static,
{
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    store: S,
    storage: Arc<O>,
    queue: Arc<Q>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    engine: Arc<SignaturePlacementEngine>,
    config: Arc<WorkerConfig>,
    cancel: CancellationToken,
  ) -> Self {
    let limiter = Arc::new(Semaphore::new(config.max_concurrency));
    Self {
      store,
      storage,
      queue,
      ledger,
      notifier,
      engine,
      config,
      limiter,
      cancel,
    }
  }

  /// Poll until cancelled.
  pub async fn run(&self) {
    info!(queue = %self.config.queue, "workflow consumer started");
    while !self.cancel.is_cancelled() {
      let handled = self.poll_once().await;
      if handled == 0 {
        tokio::select! {
          _ = self.cancel.cancelled() => break,
          _ = sleep(std::time::Duration::from_secs(
            self.config.poll_interval_secs,
          )) => {}
        }
      }
    }
    info!("workflow consumer stopped");
  }

  /// Receive one batch and handle every message to completion. Returns the
  /// batch size.
  pub async fn poll_once(&self) -> usize {
    let batch = match self.queue.receive(self.config.batch_size).await {
      Ok(batch) => batch,
      Err(error) => {
        warn!(%error, "queue receive failed");
        return 0;
      }
    };
    let count = batch.len();

    let mut tasks = JoinSet::new();
    for (receipt, envelope) in batch {
      let Ok(permit) = Arc::clone(&self.limiter).acquire_owned().await
      else {
        break;
      };
      let this = self.clone();
      tasks.spawn(async move {
        let _permit = permit;
        this.handle_message(&receipt, envelope).await;
      });
    }
    while tasks.join_next().await.is_some() {}

    count
  }

  async fn handle_message(&self, receipt: &str, envelope: QueueEnvelope) {
    let action = envelope.action;
    let result = self.dispatch(&envelope).await;

    let (outcome, detail) = match &result {
      Ok(()) => (AuditOutcome::Success, None),
      Err(error) => (AuditOutcome::Failure, Some(error.to_string())),
    };
    if let Err(error) = self
      .store
      .record_workflow_event(WorkflowAudit {
        document_id: envelope.document_id,
        action,
        outcome,
        detail,
        recorded_at: Utc::now(),
      })
      .await
    {
      warn!(%action, %error, "could not write workflow audit row");
    }

    match result {
      Ok(()) => {
        info!(%action, "workflow handled");
        if let Err(error) = self.queue.acknowledge(receipt).await {
          warn!(%action, %error, "acknowledge failed");
        }
      }
      // Left unacknowledged; the broker redelivers.
      Err(error) => warn!(%action, %error, "workflow failed"),
    }
  }

  async fn dispatch(&self, envelope: &QueueEnvelope) -> Result<()> {
    let owner = envelope.user_id.as_deref();
    match envelope.action {
      WorkflowAction::Delete => {
        let id = require_document(envelope)?;
        recycle::recycle(&self.store, id, owner).await?;
        self.notify_owner(owner, "document_recycled", id).await;
      }
      WorkflowAction::DeletePermanently => {
        let id = require_document(envelope)?;
        recycle::delete_permanently(&self.store, &*self.storage, id, owner)
          .await?;
        self.notify_owner(owner, "document_deleted", id).await;
      }
      WorkflowAction::Restore => {
        let id = require_document(envelope)?;
        recycle::restore(&self.store, id, owner).await?;
        self.notify_owner(owner, "document_restored", id).await;
      }
      WorkflowAction::DeleteContact => {
        let user = envelope
          .user_id
          .as_deref()
          .ok_or(Error::MissingField("user_id"))?;
        let payload = serde_json::json!({ "event": "contact_deleted" });
        self.notifier.notify(user, payload).await?;
      }
      WorkflowAction::SendEmail => {
        let payload = envelope
          .data_email
          .as_ref()
          .ok_or(Error::MissingField("data_email"))?;
        self.notifier.send_email(payload).await?;
      }
      WorkflowAction::FinalizeSignatureRecord => {
        self.finalize(require_document(envelope)?).await?;
      }
    }
    Ok(())
  }

  async fn notify_owner(&self, owner: Option<&str>, event: &str, id: Uuid) {
    let Some(owner) = owner else { return };
    let payload = serde_json::json!({ "event": event, "document_id": id });
    if let Err(error) = self.notifier.notify(owner, payload).await {
      warn!(document = %id, %error, "notification failed");
    }
  }

  // ── Finalize ──────────────────────────────────────────────────────────

  /// Produce the signed artifact (signatures, envelope id, annex), then
  /// register the content hash on the ledger.
  ///
  /// Safe to redeliver: a document already registered returns immediately,
  /// and a document whose artifact was produced but whose registration
  /// failed skips straight to registration.
  async fn finalize(&self, document_id: Uuid) -> Result<()> {
    let snapshot = chain::load_latest(&self.store, document_id, None).await?;
    if snapshot.status != DocumentStatus::Completed {
      return Err(
        CoreError::Validation(format!(
          "document {document_id} is not completed"
        ))
        .into(),
      );
    }
    if snapshot.is_registered() {
      return Ok(());
    }

    if snapshot.metadata.content_hash.is_none() {
      self.produce_artifact(&snapshot).await?;
    }

    let coordinator = RegistrationCoordinator::new(&self.store, &*self.ledger)
      .with_network(self.config.ledger_network.clone());
    let registered = coordinator.register(document_id, &self.cancel).await?;

    let payload = serde_json::json!({
      "event":       "document_finalized",
      "document_id": document_id,
      "url":         registered.metadata.url,
    });
    if let Err(error) = self.notifier.notify(&registered.owner, payload).await
    {
      warn!(document = %document_id, %error, "notification failed");
    }
    Ok(())
  }

  /// Run the stamping pipeline on the blocking pool and commit the new
  /// artifact into the version chain.
  async fn produce_artifact(&self, snapshot: &DocumentSnapshot) -> Result<()> {
    let document_id = snapshot.document_id;
    let pdf = self.storage.download(&snapshot.metadata.object_key).await?;

    // Resolve image renditions to bytes up front; the stamping pass itself
    // is synchronous. A missing image is a decoration failure: warn, skip.
    let mut assets = Vec::new();
    for participant in &snapshot.participants {
      for slot in &participant.slots {
        let Some(rendition) = slot.current_rendition() else { continue };
        let art = match &rendition.content {
          SignatureContent::Image { object_key } => {
            match self.storage.download(object_key).await {
              Ok(bytes) => SignatureArt::Image { bytes },
              Err(error) => {
                warn!(
                  document = %document_id,
                  %object_key,
                  %error,
                  "signature image unavailable, skipping"
                );
                continue;
              }
            }
          }
          SignatureContent::Text { text, font, color } => SignatureArt::Text {
            text:  text.clone(),
            font:  font.clone(),
            color: color.clone(),
          },
        };
        assets.push(SignatureAsset {
          participant: participant.uuid,
          placement: slot.placement,
          canvas_width: rendition.canvas_width,
          canvas_height: rendition.canvas_height,
          art,
        });
      }
    }

    let engine = Arc::clone(&self.engine);
    let filename = snapshot.metadata.object_key.clone();
    let final_url = format!(
      "{}/documents/{}",
      self.config.public_url_base, document_id
    );
    let cards = annex_cards(&snapshot.participants);
    let validations = validation_items(&snapshot.participants);

    let (bytes, hash) =
      tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, String)> {
        let stamped = engine.stamp_signatures(&pdf, &assets)?;
        let (stamped, hash) = engine.stamp_envelope_id(&stamped)?;
        let context = AnnexContext {
          filename,
          document_id,
          content_hash: Some(hash.clone()),
          final_url: Some(final_url),
        };
        let done = engine.append_annex(&stamped, &context, &cards, &validations)?;
        Ok((done, hash))
      })
      .await??;

    let size = bytes.len() as u64;
    let stored = self.storage.upload(bytes, "application/pdf").await?;

    chain::commit(&self.store, document_id, None, |current| {
      let mut metadata = current.metadata.clone();
      metadata.artifacts.push(ArtifactPointer {
        object_key:   metadata.object_key.clone(),
        url:          metadata.url.clone(),
        content_hash: metadata.content_hash.clone(),
        signed_at:    Utc::now(),
      });
      metadata.object_key = stored.key.clone();
      metadata.url = stored.url.clone();
      metadata.content_hash = Some(hash.clone());
      metadata.size = size;
      Ok(current.next().with_metadata(metadata).build())
    })
    .await?;

    Ok(())
  }
}

// ─── Envelope helpers ────────────────────────────────────────────────────────

fn require_document(envelope: &QueueEnvelope) -> Result<Uuid> {
  envelope.document_id.ok_or(Error::MissingField("document_id"))
}

/// One card per (participant, signed slot) pair: a signer holding several
/// slots appears once per slot it actually signed.
fn annex_cards(participants: &[Participant]) -> Vec<ParticipantCard> {
  let mut cards = Vec::new();
  for p in participants {
    for slot in &p.slots {
      if slot.current_rendition().is_none() {
        continue;
      }
      cards.push(ParticipantCard {
        name:       p.full_name(),
        email:      p.email.clone(),
        signed_at:  p.history.signed_at,
        ip:         p.history.ip.clone(),
        user_agent: p.history.user_agent.clone(),
        chips:      chips(p),
      });
    }
  }
  cards
}

fn chips(participant: &Participant) -> Vec<String> {
  let mut chips = vec!["email".to_owned()];
  for kind in &participant.validation_kinds {
    let chip = match kind {
      ValidationKind::Identity => "identity",
      ValidationKind::Selfie => "selfie",
      ValidationKind::Phone => "phone",
      ValidationKind::Email => continue,
    };
    chips.push(chip.to_owned());
  }
  chips
}

/// Flatten each participant's signing history into one annex item. Weight
/// grows with the line count so long histories land on their own page.
fn validation_items(participants: &[Participant]) -> Vec<ValidationItem> {
  participants
    .iter()
    .filter(|p| !p.history.audit_log.is_empty())
    .map(|p| {
      let mut lines = Vec::new();
      for entry in &p.history.audit_log {
        let raw = format!(
          "{} {}",
          entry.at.format("%Y-%m-%d %H:%M:%S UTC"),
          entry.event
        );
        lines.extend(wrap_text(&raw, 50));
      }
      let weight = (80 + 15 * lines.len() as u32).min(250);
      ValidationItem { title: p.full_name(), lines, weight }
    })
    .collect()
}
