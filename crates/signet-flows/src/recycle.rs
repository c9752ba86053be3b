//! Recycler (soft delete), restore, permanent delete, and rollback.

use signet_core::{
  clients::ObjectStorage,
  document::{DocumentSnapshot, DocumentStatus},
  lifecycle,
  store::VersionStore,
};
use tracing::warn;
use uuid::Uuid;

use crate::{chain, Error, Result};

/// Soft-delete: move the document into the recycler. Deletion proper is a
/// separate, second step.
pub async fn recycle<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
) -> Result<DocumentSnapshot> {
  chain::commit(store, document_id, owner, |current| {
    lifecycle::ensure_document_transition(
      current.status,
      DocumentStatus::Recycler,
    )?;
    Ok(current.next().with_status(DocumentStatus::Recycler).build())
  })
  .await
}

/// Restore a recycled document to a workable status: `Rejected` when it was
/// rejected before recycling, `Draft` otherwise.
pub async fn restore<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
) -> Result<DocumentSnapshot> {
  // The pre-recycle status lives in the version history.
  let versions = store
    .all_versions(document_id)
    .await
    .map_err(Error::store)?;
  let target = versions
    .iter()
    .find(|v| v.status != DocumentStatus::Recycler)
    .map(|v| v.status);
  let target = match target {
    Some(DocumentStatus::Rejected) => DocumentStatus::Rejected,
    _ => DocumentStatus::Draft,
  };

  chain::commit(store, document_id, owner, |current| {
    lifecycle::ensure_document_transition(current.status, target)?;
    Ok(current.next().with_status(target).build())
  })
  .await
}

/// Hard-delete a recycled document. The terminal snapshot is appended first;
/// artifact and link cleanup is best-effort afterwards.
pub async fn delete_permanently<S, O>(
  store: &S,
  storage: &O,
  document_id: Uuid,
  owner: Option<&str>,
) -> Result<DocumentSnapshot>
where
  S: VersionStore,
  O: ObjectStorage,
{
  let snapshot = chain::commit(store, document_id, owner, |current| {
    lifecycle::ensure_document_transition(
      current.status,
      DocumentStatus::Deleted,
    )?;
    Ok(current.next().with_status(DocumentStatus::Deleted).build())
  })
  .await?;

  let mut keys = vec![snapshot.metadata.object_key.clone()];
  keys.extend(
    snapshot.metadata.artifacts.iter().map(|a| a.object_key.clone()),
  );
  for key in keys {
    if let Err(error) = storage.delete(&key).await {
      warn!(%document_id, %key, %error, "artifact cleanup failed");
    }
  }
  if let Err(error) = store.revoke_signing_links(document_id).await {
    warn!(%document_id, %error, "could not revoke signing links");
  }

  Ok(snapshot)
}

/// Roll the chain forward to a copy of `target_version`. History is never
/// rewritten; the copy is appended at the head.
pub async fn rollback<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  target_version: u32,
) -> Result<DocumentSnapshot> {
  store
    .rollback(document_id, target_version)
    .await
    .map_err(Error::store)
}
