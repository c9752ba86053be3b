//! A signer declining to sign.

use chrono::Utc;
use signet_core::{
  clients::Notifier,
  document::{DocumentSnapshot, DocumentStatus},
  lifecycle,
  store::VersionStore,
  Error as CoreError,
};
use tracing::warn;
use uuid::Uuid;

use crate::{chain, sign::SigningEvent, Result};

/// Reject the document on behalf of one signer. One rejection moves the
/// whole document to `Rejected` regardless of how far the others got; the
/// rejecting signer loses `can_sign` until an explicit re-sign.
pub async fn reject<S, N>(
  store: &S,
  notifier: &N,
  document_id: Uuid,
  participant_id: Uuid,
  reason: Option<String>,
  event: SigningEvent,
) -> Result<DocumentSnapshot>
where
  S: VersionStore,
  N: Notifier,
{
  let snapshot = chain::commit(store, document_id, None, |current| {
    if !current.options.allow_reject {
      return Err(
        CoreError::Validation("rejection is disabled for this document".into())
          .into(),
      );
    }

    let mut participant = current
      .participant(participant_id)
      .ok_or(CoreError::ParticipantNotFound(participant_id))?
      .clone();
    lifecycle::reject(
      &mut participant,
      reason.clone(),
      Utc::now(),
      event.ip.clone(),
      event.user_agent.clone(),
    )?;

    lifecycle::ensure_document_transition(
      current.status,
      DocumentStatus::Rejected,
    )?;

    Ok(
      current
        .next()
        .with_participant(participant)
        .with_status(DocumentStatus::Rejected)
        .build(),
    )
  })
  .await?;

  let payload = serde_json::json!({
    "event": "document_rejected",
    "document_id": document_id,
    "participant_id": participant_id,
    "reason": reason,
  });
  if let Err(error) = notifier.notify(&snapshot.owner, payload).await {
    warn!(%document_id, %error, "rejection notification failed");
  }

  Ok(snapshot)
}
