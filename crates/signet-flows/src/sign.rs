//! Recording signature content and completing a signer's round.

use chrono::Utc;
use signet_core::{
  clients::{IdentityValidation, MessageQueue, QueueEnvelope, WorkflowAction},
  document::{DocumentSnapshot, DocumentStatus},
  lifecycle,
  signature::SlotRendition,
  store::VersionStore,
  Error as CoreError,
};
use tracing::warn;
use uuid::Uuid;

use crate::{chain, Result};

/// Request context captured at signing time.
#[derive(Debug, Clone, Default)]
pub struct SigningEvent {
  pub ip:         Option<String>,
  pub user_agent: Option<String>,
}

/// Append rendered signature content to one of the participant's slots.
/// Renditions accumulate; earlier rounds stay auditable.
pub async fn record_rendition<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  participant_id: Uuid,
  slot_id: Uuid,
  rendition: SlotRendition,
) -> Result<DocumentSnapshot> {
  chain::commit(store, document_id, None, |current| {
    let mut participant = current
      .participant(participant_id)
      .ok_or(CoreError::ParticipantNotFound(participant_id))?
      .clone();

    let slot = participant
      .slots
      .iter_mut()
      .find(|s| s.id == slot_id)
      .ok_or_else(|| {
        CoreError::Validation(format!(
          "no slot {slot_id} for participant {participant_id}"
        ))
      })?;
    slot.renditions.push(rendition.clone());
    participant.history.log("signature content recorded");

    Ok(current.next().with_participant(participant).build())
  })
  .await
}

/// Complete a signer's round: `Pending -> Signed`, then aggregate. When the
/// last signer completes, the document moves to `Completed`, its signing
/// links are revoked, and a finalize workflow is queued.
pub async fn sign<S, V, Q>(
  store: &S,
  validation: &V,
  queue: &Q,
  document_id: Uuid,
  participant_id: Uuid,
  event: SigningEvent,
) -> Result<DocumentSnapshot>
where
  S: VersionStore,
  V: IdentityValidation,
  Q: MessageQueue,
{
  let latest = chain::load_latest(store, document_id, None).await?;
  let participant = latest
    .participant(participant_id)
    .ok_or(CoreError::ParticipantNotFound(participant_id))?;

  // Refresh the follow status before the guard runs, so a signer who just
  // finished validation is not bounced on stale state.
  let refreshed_follow = match (&participant.follow_id, participant.require_validation) {
    (Some(follow_id), true) => {
      Some(validation.follow_status(follow_id).await?.status)
    }
    _ => None,
  };

  let snapshot = chain::commit(store, document_id, None, |current| {
    if current.status != DocumentStatus::InProgress {
      return Err(
        CoreError::Validation(format!(
          "document is not open for signing ({})",
          current.status
        ))
        .into(),
      );
    }

    let mut participant = current
      .participant(participant_id)
      .ok_or(CoreError::ParticipantNotFound(participant_id))?
      .clone();
    if let Some(status) = refreshed_follow {
      participant.follow_status = status;
    }

    lifecycle::sign(
      &mut participant,
      Utc::now(),
      event.ip.clone(),
      event.user_agent.clone(),
    )?;

    let mut builder = current.next().with_participant(participant.clone());

    let mut participants = current.participants.clone();
    if let Some(slot) =
      participants.iter_mut().find(|p| p.uuid == participant_id)
    {
      *slot = participant;
    }
    if let Some(DocumentStatus::Completed) =
      lifecycle::aggregate_participants(&participants)
    {
      lifecycle::ensure_document_transition(
        current.status,
        DocumentStatus::Completed,
      )?;
      builder = builder.with_status(DocumentStatus::Completed);
    }

    Ok(builder.build())
  })
  .await?;

  if snapshot.status == DocumentStatus::Completed {
    if let Err(error) = store.revoke_signing_links(document_id).await {
      warn!(%document_id, %error, "could not revoke signing links");
    }

    let envelope = QueueEnvelope {
      action:      WorkflowAction::FinalizeSignatureRecord,
      document_id: Some(document_id),
      user_id:     Some(snapshot.owner.clone()),
      data_email:  None,
      timestamp:   Utc::now(),
    };
    if let Err(error) = queue.publish("workflow", envelope).await {
      warn!(%document_id, %error, "could not queue finalize workflow");
    }
  }

  Ok(snapshot)
}
