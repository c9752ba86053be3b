//! Document and participant state machines.
//!
//! Every workflow mutation is gated here before a new version is appended.
//! Transitions outside the table fail with
//! [`Error::InvalidStatusTransition`] / [`Error::InvalidParticipantTransition`]
//! and are never silently ignored.

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  document::{DocumentSnapshot, DocumentStatus},
  participant::{FollowStatus, Participant, ParticipantStatus},
};

// ─── Document state machine ──────────────────────────────────────────────────

/// Whether `from -> to` appears in the document transition table.
///
/// `Completed` and `Deleted` are terminal; blockchain registration does not
/// change the document status and is guarded separately by
/// [`ensure_can_register`].
pub fn document_transition_allowed(
  from: DocumentStatus,
  to: DocumentStatus,
) -> bool {
  use DocumentStatus::*;
  matches!(
    (from, to),
    (Draft, InProgress)
      | (Draft, Rejected)
      | (Draft, Recycler)
      | (InProgress, Completed)
      | (InProgress, Rejected)
      | (InProgress, Recycler)
      | (Rejected, InProgress)
      | (Rejected, Recycler)
      | (Recycler, Deleted)
      | (Recycler, Draft)
      | (Recycler, Rejected)
  )
}

pub fn ensure_document_transition(
  from: DocumentStatus,
  to: DocumentStatus,
) -> Result<()> {
  if document_transition_allowed(from, to) {
    Ok(())
  } else {
    Err(Error::InvalidStatusTransition { from, to })
  }
}

/// Guard for `Draft -> InProgress`: the document must have at least one
/// participant and every participant must own at least one signature slot
/// (a slotless signer could never fulfil the completion predicate).
pub fn ensure_can_send(snapshot: &DocumentSnapshot) -> Result<()> {
  ensure_document_transition(snapshot.status, DocumentStatus::InProgress)?;

  if snapshot.participants.is_empty() {
    return Err(Error::Validation(
      "cannot send a document without participants".into(),
    ));
  }
  if let Some(p) =
    snapshot.participants.iter().find(|p| p.slots.is_empty())
  {
    return Err(Error::Validation(format!(
      "participant {} has no signature slots",
      p.email
    )));
  }
  Ok(())
}

/// Aggregate participant statuses into a document-level outcome.
///
/// A single `Rejected` forces `Rejected` regardless of the others; all
/// `Signed` yields `Completed`; anything else leaves the document as is.
pub fn aggregate_participants(
  participants: &[Participant],
) -> Option<DocumentStatus> {
  if participants
    .iter()
    .any(|p| p.status == ParticipantStatus::Rejected)
  {
    return Some(DocumentStatus::Rejected);
  }
  if !participants.is_empty()
    && participants
      .iter()
      .all(|p| p.status == ParticipantStatus::Signed)
  {
    return Some(DocumentStatus::Completed);
  }
  None
}

/// Guard for blockchain registration: only from `Completed`, with no rejected
/// participant and no prior successful registration.
pub fn ensure_can_register(snapshot: &DocumentSnapshot) -> Result<()> {
  if snapshot.is_registered() {
    return Err(Error::AlreadyRegistered(snapshot.document_id));
  }
  if snapshot.status != DocumentStatus::Completed {
    return Err(Error::InvalidStatusTransition {
      from: snapshot.status,
      to:   DocumentStatus::Completed,
    });
  }
  if snapshot
    .participants
    .iter()
    .any(|p| p.status == ParticipantStatus::Rejected)
  {
    return Err(Error::Validation(
      "cannot register a document with rejected participants".into(),
    ));
  }
  Ok(())
}

// ─── Participant state machine ───────────────────────────────────────────────

/// Move a signer into `Pending` and open a new signing round. Used by the
/// send flow (from `WaitingToBeSent`) and by [`resign`].
pub fn mark_pending(participant: &mut Participant, now: DateTime<Utc>) {
  participant.status = ParticipantStatus::Pending;
  participant.history.can_sign = true;
  participant.history.round_started_at = Some(now);
  participant.history.log("round opened");
}

/// Guard for `Pending -> Signed`.
pub fn ensure_can_sign(participant: &Participant) -> Result<()> {
  if participant.status != ParticipantStatus::Pending {
    return Err(Error::InvalidParticipantTransition {
      participant: participant.uuid,
      from:        participant.status,
      to:          ParticipantStatus::Signed,
    });
  }
  if !participant.history.can_sign {
    return Err(Error::Validation(format!(
      "participant {} is blocked from signing",
      participant.uuid
    )));
  }
  if participant.require_validation
    && participant.follow_status != FollowStatus::Completed
  {
    return Err(Error::Validation(format!(
      "identity validation not completed for participant {}",
      participant.uuid
    )));
  }
  if !participant.all_slots_fulfilled() {
    return Err(Error::Validation(format!(
      "participant {} has unfulfilled signature slots",
      participant.uuid
    )));
  }
  Ok(())
}

/// Apply `Pending -> Signed` after [`ensure_can_sign`] passes.
pub fn sign(
  participant: &mut Participant,
  now: DateTime<Utc>,
  ip: Option<String>,
  user_agent: Option<String>,
) -> Result<()> {
  ensure_can_sign(participant)?;
  participant.status = ParticipantStatus::Signed;
  participant.history.has_signed = true;
  participant.history.signed_at = Some(now);
  participant.history.ip = ip;
  participant.history.user_agent = user_agent;
  participant.history.log("signed");
  Ok(())
}

/// Apply `Pending -> Rejected`. Legal while `can_sign` holds; afterwards
/// `can_sign` is forced false so the signer cannot act again without an
/// explicit re-sign.
pub fn reject(
  participant: &mut Participant,
  reason: Option<String>,
  now: DateTime<Utc>,
  ip: Option<String>,
  user_agent: Option<String>,
) -> Result<()> {
  if participant.status != ParticipantStatus::Pending
    || !participant.history.can_sign
  {
    return Err(Error::InvalidParticipantTransition {
      participant: participant.uuid,
      from:        participant.status,
      to:          ParticipantStatus::Rejected,
    });
  }
  participant.status = ParticipantStatus::Rejected;
  participant.history.has_rejected = true;
  participant.history.rejection_reason = reason;
  participant.history.rejected_at = Some(now);
  participant.history.ip = ip;
  participant.history.user_agent = user_agent;
  participant.history.can_sign = false;
  participant.history.log("rejected");
  Ok(())
}

/// Reset a signer back to `Pending` from any terminal state. Guarded against
/// double re-sign: a participant already `Pending` cannot be reset again.
///
/// Only the named participant is touched; sibling participants keep their
/// history and their ability (or inability) to sign.
pub fn resign(
  participant: &mut Participant,
  now: DateTime<Utc>,
) -> Result<()> {
  if participant.status == ParticipantStatus::Pending {
    return Err(Error::InvalidParticipantTransition {
      participant: participant.uuid,
      from:        participant.status,
      to:          ParticipantStatus::Pending,
    });
  }
  participant.history.log("re-sign requested");
  mark_pending(participant, now);
  Ok(())
}
