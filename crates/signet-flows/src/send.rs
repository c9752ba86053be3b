//! Sending a draft out for signature.

use chrono::{Duration, Utc};
use signet_core::{
  clients::{EmailPayload, FollowSession, IdentityValidation, Notifier},
  document::{DocumentSnapshot, DocumentStatus},
  lifecycle,
  participant::FollowStatus,
  store::{SigningLink, VersionStore},
};
use tracing::warn;
use uuid::Uuid;

use crate::{chain, Result};

/// How long an allocated signing link stays valid.
const LINK_TTL_DAYS: i64 = 30;

/// Move a draft to `InProgress`: every participant becomes `Pending` with a
/// fresh signing round, identity-validation sessions are started where
/// required, signing links are allocated, and signers are notified.
///
/// Validation-session and email failures are logged and do not abort the
/// send; the committed snapshot is the source of truth.
pub async fn send<S, V, N>(
  store: &S,
  validation: &V,
  notifier: &N,
  document_id: Uuid,
  owner: &str,
) -> Result<DocumentSnapshot>
where
  S: VersionStore,
  V: IdentityValidation,
  N: Notifier,
{
  let latest = chain::load_latest(store, document_id, Some(owner)).await?;
  lifecycle::ensure_can_send(&latest)?;

  // Start follow sessions up front; the commit closure must stay synchronous.
  let mut sessions: Vec<(Uuid, FollowSession)> = Vec::new();
  for participant in &latest.participants {
    if participant.require_validation && participant.follow_id.is_none() {
      match validation.start_follow(participant).await {
        Ok(session) => sessions.push((participant.uuid, session)),
        Err(error) => warn!(
          participant = %participant.uuid,
          %error,
          "could not start identity validation, signer must retry later"
        ),
      }
    }
  }

  let tokens: Vec<(Uuid, String)> = latest
    .participants
    .iter()
    .map(|p| (p.uuid, Uuid::new_v4().simple().to_string()))
    .collect();

  let snapshot = chain::commit(store, document_id, Some(owner), |current| {
    lifecycle::ensure_can_send(current)?;

    let now = Utc::now();
    let mut participants = current.participants.clone();
    for participant in &mut participants {
      lifecycle::mark_pending(participant, now);
      if let Some((_, session)) =
        sessions.iter().find(|(id, _)| *id == participant.uuid)
      {
        participant.follow_id = Some(session.follow_id.clone());
        participant.follow_url = Some(session.url.clone());
        participant.follow_status = FollowStatus::Processing;
      }
      if let Some((_, token)) =
        tokens.iter().find(|(id, _)| *id == participant.uuid)
      {
        participant.signer_link = Some(token.clone());
      }
    }

    Ok(
      current
        .next()
        .with_status(DocumentStatus::InProgress)
        .with_participants(participants)
        .build(),
    )
  })
  .await?;

  let expires_at = Utc::now() + Duration::days(LINK_TTL_DAYS);
  for (participant_id, token) in &tokens {
    let link = SigningLink {
      token: token.clone(),
      document_id,
      participant_id: *participant_id,
      expires_at,
    };
    if let Err(error) = store.put_signing_link(link).await {
      warn!(participant = %participant_id, %error, "could not store signing link");
    }
  }

  for participant in &snapshot.participants {
    let payload = EmailPayload {
      from:    "noreply@signet.local".into(),
      to:      participant.email.clone(),
      subject: format!("Signature requested: {}", snapshot.metadata.object_key),
      text:    format!(
        "{}, you have a document waiting for your signature.",
        participant.full_name()
      ),
      html:    None,
    };
    if let Err(error) = notifier.send_email(&payload).await {
      warn!(to = %participant.email, %error, "signature-request email failed");
    }
  }

  Ok(snapshot)
}
