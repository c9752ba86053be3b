//! Commit helper for the append-only version chain.

use signet_core::{document::DocumentSnapshot, store::VersionStore, Error as CoreError};
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

/// How many append conflicts to absorb before giving up.
const CONFLICT_RETRIES: usize = 3;

/// Load the latest snapshot of `document_id`, failing when it does not exist
/// or belongs to a different owner.
pub async fn load_latest<S: VersionStore>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
) -> Result<DocumentSnapshot> {
  store
    .latest(document_id, owner)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| CoreError::DocumentNotFound(document_id).into())
}

/// Commit a mutation against the head of the chain.
///
/// `mutate` receives the current latest snapshot and returns the successor
/// to append (or a domain error). On an append conflict the latest snapshot
/// is re-read and `mutate` re-run, so the mutation is always validated
/// against the state that actually wins.
pub async fn commit<S, F>(
  store: &S,
  document_id: Uuid,
  owner: Option<&str>,
  mut mutate: F,
) -> Result<DocumentSnapshot>
where
  S: VersionStore,
  F: FnMut(&DocumentSnapshot) -> Result<DocumentSnapshot>,
{
  for _ in 0..=CONFLICT_RETRIES {
    let latest = load_latest(store, document_id, owner).await?;
    let next = mutate(&latest)?;

    match store.append_version(next).await {
      Ok(snapshot) => return Ok(snapshot),
      Err(error) if S::is_conflict(&error) => {
        debug!(%document_id, "append conflict, re-reading head");
        continue;
      }
      Err(error) => return Err(Error::store(error)),
    }
  }

  Err(Error::ConflictBudget(document_id))
}
