//! Re-opening a rejected signer's round.

use chrono::{Duration, Utc};
use signet_core::{
  document::{DocumentSnapshot, DocumentStatus},
  lifecycle,
  store::{SigningLink, VersionStore},
  Error as CoreError,
};
use tracing::warn;
use uuid::Uuid;

use crate::{chain, Result};

const LINK_TTL_DAYS: i64 = 30;

/// Reset one signer back to `Pending` with a fresh signing round and a fresh
/// link. Only the named participant is touched; siblings keep their state.
/// A `Rejected` document moves back to `InProgress`; a document in any other
/// non-`InProgress` status (terminal states included) is refused.
pub async fn resign<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  participant_id: Uuid,
) -> Result<DocumentSnapshot> {
  let token = Uuid::new_v4().simple().to_string();

  let snapshot = chain::commit(store, document_id, None, |current| {
    if !matches!(
      current.status,
      DocumentStatus::InProgress | DocumentStatus::Rejected
    ) {
      return Err(
        CoreError::InvalidStatusTransition {
          from: current.status,
          to:   DocumentStatus::InProgress,
        }
        .into(),
      );
    }

    let mut participant = current
      .participant(participant_id)
      .ok_or(CoreError::ParticipantNotFound(participant_id))?
      .clone();
    lifecycle::resign(&mut participant, Utc::now())?;
    participant.signer_link = Some(token.clone());

    let mut builder = current.next().with_participant(participant);
    if current.status == DocumentStatus::Rejected {
      lifecycle::ensure_document_transition(
        current.status,
        DocumentStatus::InProgress,
      )?;
      builder = builder.with_status(DocumentStatus::InProgress);
    }
    Ok(builder.build())
  })
  .await?;

  let link = SigningLink {
    token,
    document_id,
    participant_id,
    expires_at: Utc::now() + Duration::days(LINK_TTL_DAYS),
  };
  if let Err(error) = store.put_signing_link(link).await {
    warn!(participant = %participant_id, %error, "could not store signing link");
  }

  Ok(snapshot)
}
