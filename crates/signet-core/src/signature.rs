//! Signature slots and their rendered-content records.
//!
//! A slot is a placement rectangle on a page awaiting signature content.
//! Rendered content is appended as [`SlotRendition`] records — never replaced
//! — so earlier rounds remain auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Placement ───────────────────────────────────────────────────────────────

/// Editor-relative placement of a signature box.
///
/// `left`/`top` are fractions of the editor canvas in `[0, 1]` and denote the
/// *centre* of the box; `width`/`height` are canvas pixels at capture time.
/// The PDF engine maps these into page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
  /// Zero-based page index in the editor ("slide").
  pub slide_index: u32,
  pub top:         f64,
  pub left:        f64,
  pub width:       f64,
  pub height:      f64,
  /// Degrees, counter-clockwise.
  pub rotation:    f64,
}

// ─── Rendered content ────────────────────────────────────────────────────────

/// What the signer actually produced for a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignatureContent {
  /// A drawn or uploaded signature image stored in object storage.
  Image { object_key: String },
  /// A typed signature rendered in a named decorative font.
  Text {
    text:  String,
    /// Font family name; unknown names fall back to the default sans face.
    font:  String,
    color: String,
  },
}

/// One rendered-content record appended to a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRendition {
  pub content:       SignatureContent,
  /// Editor canvas dimensions at capture time, used to scale the box.
  pub canvas_width:  f64,
  pub canvas_height: f64,
  pub created_at:    DateTime<Utc>,
}

// ─── Slot ────────────────────────────────────────────────────────────────────

/// A placement rectangle bound to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSlot {
  pub id:         Uuid,
  /// The participant this slot belongs to; fixed at creation.
  pub recipient:  Uuid,
  pub placement:  Placement,
  /// Append-only; the last entry is the one stamped into the PDF.
  pub renditions: Vec<SlotRendition>,
}

impl SignatureSlot {
  pub fn new(recipient: Uuid, placement: Placement) -> Self {
    Self {
      id: Uuid::new_v4(),
      recipient,
      placement,
      renditions: Vec::new(),
    }
  }

  /// Whether the slot gained a rendition at or after `since`. With no round
  /// marker, any rendition fulfils the slot.
  pub fn fulfilled_since(&self, since: Option<DateTime<Utc>>) -> bool {
    match since {
      Some(t) => self.renditions.iter().any(|r| r.created_at >= t),
      None    => !self.renditions.is_empty(),
    }
  }

  /// The rendition that should be stamped: the latest one.
  pub fn current_rendition(&self) -> Option<&SlotRendition> {
    self.renditions.last()
  }
}
