//! [`SqliteStore`] — the SQLite implementation of [`VersionStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use signet_core::{
  document::DocumentSnapshot,
  store::{
    AuditLog, RegistrationAttempt, SigningLink, VersionStore, WorkflowAudit,
  },
};

use crate::{
  encode::{
    decode_snapshot, encode_action, encode_dt, encode_outcome,
    encode_snapshot, encode_uuid, RawAttempt, RawEvent, RawLink,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Signet version store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one snapshot by an exact WHERE clause on `document_id` plus an
  /// optional version. `None` version means the maximal one.
  async fn fetch_snapshot(
    &self,
    document_id: Uuid,
    version: Option<u32>,
  ) -> Result<Option<DocumentSnapshot>> {
    let id_str = encode_uuid(document_id);

    let json: Option<String> = self
      .conn
      .call(move |conn| {
        let row = match version {
          Some(v) => conn
            .query_row(
              "SELECT snapshot_json FROM documents
               WHERE document_id = ?1 AND version = ?2",
              rusqlite::params![id_str, v],
              |r| r.get(0),
            )
            .optional()?,
          None => conn
            .query_row(
              "SELECT snapshot_json FROM documents
               WHERE document_id = ?1
               ORDER BY version DESC LIMIT 1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?,
        };
        Ok(row)
      })
      .await?;

    json.as_deref().map(decode_snapshot).transpose()
  }
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for SqliteStore {
  type Error = Error;

  fn is_conflict(error: &Error) -> bool {
    matches!(error, Error::Conflict { .. })
  }

  // ── Version chain — append-only writes ────────────────────────────────────

  async fn append_version(
    &self,
    snapshot: DocumentSnapshot,
  ) -> Result<DocumentSnapshot> {
    let id_str         = encode_uuid(snapshot.document_id);
    let version        = snapshot.version;
    let owner          = snapshot.owner.clone();
    let status_str     = snapshot.status.to_string();
    let is_rollback    = snapshot.is_rollback;
    let snapshot_json  = encode_snapshot(&snapshot)?;
    let created_at_str = encode_dt(snapshot.created_at);
    let updated_at_str = encode_dt(snapshot.updated_at);

    // The guard makes the append atomic: the row is written only when this
    // version is exactly max + 1 at commit time. A raced writer inserts zero
    // rows and observes a conflict instead of forking the chain.
    let affected = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO documents (
             document_id, version, owner, status,
             is_rollback, snapshot_json, created_at, updated_at
           )
           SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
           WHERE ?2 = (
             SELECT COALESCE(MAX(version), 0) + 1
             FROM documents WHERE document_id = ?1
           )",
          rusqlite::params![
            id_str,
            version,
            owner,
            status_str,
            is_rollback,
            snapshot_json,
            created_at_str,
            updated_at_str,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if affected == 0 {
      return Err(Error::Conflict {
        document_id: snapshot.document_id,
        version:     snapshot.version,
      });
    }

    Ok(snapshot)
  }

  // ── Version chain — reads ─────────────────────────────────────────────────

  async fn latest(
    &self,
    document_id: Uuid,
    owner: Option<&str>,
  ) -> Result<Option<DocumentSnapshot>> {
    let snapshot = self.fetch_snapshot(document_id, None).await?;
    Ok(match (snapshot, owner) {
      (Some(s), Some(o)) if s.owner != o => None,
      (s, _) => s,
    })
  }

  async fn version(
    &self,
    document_id: Uuid,
    version: u32,
  ) -> Result<Option<DocumentSnapshot>> {
    self.fetch_snapshot(document_id, Some(version)).await
  }

  async fn all_versions(
    &self,
    document_id: Uuid,
  ) -> Result<Vec<DocumentSnapshot>> {
    let id_str = encode_uuid(document_id);

    let jsons: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT snapshot_json FROM documents
           WHERE document_id = ?1
           ORDER BY version DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    jsons.iter().map(|j| decode_snapshot(j)).collect()
  }

  async fn rollback(
    &self,
    document_id: Uuid,
    target_version: u32,
  ) -> Result<DocumentSnapshot> {
    let latest = self
      .fetch_snapshot(document_id, None)
      .await?
      .ok_or(Error::DocumentNotFound(document_id))?;

    let target = self
      .fetch_snapshot(document_id, Some(target_version))
      .await?
      .ok_or(Error::VersionNotFound { document_id, version: target_version })?;

    // Roll forward, never back: the target's fields become a brand-new
    // version at the head of the chain.
    let mut next = target;
    next.version = latest.version + 1;
    next.is_rollback = true;
    next.updated_at = Utc::now();

    self.append_version(next).await
  }

  // ── Registration audit ────────────────────────────────────────────────────

  async fn record_registration_attempt(
    &self,
    attempt: RegistrationAttempt,
  ) -> Result<()> {
    let id_str     = encode_uuid(attempt.document_id);
    let action_str = encode_action(attempt.action).to_owned();
    let at_str     = encode_dt(attempt.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO registration_attempts (
             document_id, attempt_number, action, recorded_at,
             hash, network, error
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            attempt.attempt_number,
            action_str,
            at_str,
            attempt.hash,
            attempt.network,
            attempt.error,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn registration_attempts(
    &self,
    document_id: Uuid,
  ) -> Result<Vec<RegistrationAttempt>> {
    let id_str = encode_uuid(document_id);

    let raws: Vec<RawAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT document_id, attempt_number, action, recorded_at,
                  hash, network, error
           FROM registration_attempts
           WHERE document_id = ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawAttempt {
              document_id:    row.get(0)?,
              attempt_number: row.get(1)?,
              action:         row.get(2)?,
              recorded_at:    row.get(3)?,
              hash:           row.get(4)?,
              network:        row.get(5)?,
              error:          row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttempt::into_attempt).collect()
  }

  // ── Signing links ─────────────────────────────────────────────────────────

  async fn put_signing_link(&self, link: SigningLink) -> Result<()> {
    let doc_str  = encode_uuid(link.document_id);
    let part_str = encode_uuid(link.participant_id);
    let at_str   = encode_dt(link.expires_at);
    let token    = link.token;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO signer_links
             (token, document_id, participant_id, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token, doc_str, part_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn resolve_signing_link(
    &self,
    token: &str,
  ) -> Result<Option<SigningLink>> {
    let token_str = token.to_owned();
    let now_str   = encode_dt(Utc::now());

    let raw: Option<RawLink> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token, document_id, participant_id, expires_at
             FROM signer_links
             WHERE token = ?1 AND expires_at > ?2",
            rusqlite::params![token_str, now_str],
            |row| {
              Ok(RawLink {
                token:          row.get(0)?,
                document_id:    row.get(1)?,
                participant_id: row.get(2)?,
                expires_at:     row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawLink::into_link).transpose()
  }

  async fn revoke_signing_links(&self, document_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(document_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM signer_links WHERE document_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── AuditLog impl ───────────────────────────────────────────────────────────

impl AuditLog for SqliteStore {
  type Error = Error;

  async fn record_workflow_event(&self, event: WorkflowAudit) -> Result<()> {
    let doc_str     = event.document_id.map(encode_uuid);
    let action_str  = event.action.to_string();
    let outcome_str = encode_outcome(event.outcome).to_owned();
    let at_str      = encode_dt(event.recorded_at);
    let detail      = event.detail;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO workflow_audit (
             document_id, action, outcome, detail, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![doc_str, action_str, outcome_str, detail, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn workflow_events(
    &self,
    document_id: Uuid,
  ) -> Result<Vec<WorkflowAudit>> {
    let id_str = encode_uuid(document_id);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT document_id, action, outcome, detail, recorded_at
           FROM workflow_audit
           WHERE document_id = ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawEvent {
              document_id: row.get(0)?,
              action:      row.get(1)?,
              outcome:     row.get(2)?,
              detail:      row.get(3)?,
              recorded_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}
