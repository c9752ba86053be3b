//! Creating a document and editing its signer roster while in `Draft`.

use signet_core::{
  document::{
    DocumentMetadata, DocumentOptions, DocumentSnapshot, DocumentStatus,
  },
  participant::Participant,
  store::VersionStore,
  Error as CoreError,
};
use uuid::Uuid;

use crate::{chain, Error, Result};

/// Create a new document in `Draft` at version 1.
pub async fn create<S: VersionStore>(
  store: &S,
  owner: impl Into<String>,
  metadata: DocumentMetadata,
  options: DocumentOptions,
) -> Result<DocumentSnapshot> {
  let snapshot = DocumentSnapshot::initial(owner, metadata, options);
  store.append_version(snapshot).await.map_err(Error::store)
}

fn ensure_draft(current: &DocumentSnapshot) -> Result<()> {
  if current.status != DocumentStatus::Draft {
    return Err(
      CoreError::Validation(format!(
        "signers can only be edited in draft ({})",
        current.status
      ))
      .into(),
    );
  }
  Ok(())
}

/// Append a version with `participant` added to the roster.
pub async fn add_signer<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
  participant: Participant,
) -> Result<DocumentSnapshot> {
  chain::commit(store, document_id, owner, |current| {
    ensure_draft(current)?;
    if current.participant(participant.uuid).is_some() {
      return Err(
        CoreError::Validation(format!(
          "participant {} is already on the document",
          participant.uuid
        ))
        .into(),
      );
    }

    let mut participants = current.participants.clone();
    participants.push(participant.clone());
    Ok(current.next().with_participants(participants).build())
  })
  .await
}

/// Append a version with the participant of the same uuid replaced.
pub async fn update_signer<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
  participant: Participant,
) -> Result<DocumentSnapshot> {
  chain::commit(store, document_id, owner, |current| {
    ensure_draft(current)?;
    current
      .participant(participant.uuid)
      .ok_or(CoreError::ParticipantNotFound(participant.uuid))?;
    Ok(current.next().with_participant(participant.clone()).build())
  })
  .await
}

/// Append a version with the named participant removed.
pub async fn remove_signer<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
  participant_id: Uuid,
) -> Result<DocumentSnapshot> {
  chain::commit(store, document_id, owner, |current| {
    ensure_draft(current)?;
    current
      .participant(participant_id)
      .ok_or(CoreError::ParticipantNotFound(participant_id))?;

    let participants = current
      .participants
      .iter()
      .filter(|p| p.uuid != participant_id)
      .cloned()
      .collect();
    Ok(current.next().with_participants(participants).build())
  })
  .await
}
