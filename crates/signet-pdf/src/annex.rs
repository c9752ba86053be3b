//! Signature-record annex pages.
//!
//! The annex is appended as new pages, never edits to existing ones. One set
//! of pages carries participant cards (two per page); a second set carries
//! identity-validation records, binned against a per-page height budget so an
//! item is never split across pages.

use chrono::{DateTime, Utc};
use lopdf::{
  content::{Content, Operation},
  dictionary, Dictionary, Document, Object, ObjectId, Stream,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
  stamp::{add_jpeg_xobject, save_document, SignaturePlacementEngine},
  Error, Result,
};

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 48.0;
const HEADER_HEIGHT: f64 = 120.0;
const CARD_HEIGHT: f64 = 230.0;

/// Height budget for validation items on one page, in layout units.
pub const PAGE_BUDGET: u32 = 500;
/// Participant cards per annex page.
pub const CARDS_PER_PAGE: usize = 2;
/// Body text wraps at this many characters per line.
pub const WRAP_WIDTH: usize = 50;

fn real(value: f64) -> Object { Object::Real(value as f32) }

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Document identity rendered in every annex page header.
pub struct AnnexContext {
  pub filename:     String,
  pub document_id:  Uuid,
  pub content_hash: Option<String>,
  /// Public URL of the final document; rendered as a QR code when present.
  pub final_url:    Option<String>,
}

/// One (participant, signature) pair flattened for the annex.
pub struct ParticipantCard {
  pub name:       String,
  pub email:      String,
  pub signed_at:  Option<DateTime<Utc>>,
  pub ip:         Option<String>,
  pub user_agent: Option<String>,
  /// Authentication-type chips, e.g. "email", "identity".
  pub chips:      Vec<String>,
}

/// One identity-validation record. `weight` is the layout height the item
/// needs: short items (phone/email) run 80–125 units, long items
/// (identity/facial) 160–250.
pub struct ValidationItem {
  pub title:  String,
  pub lines:  Vec<String>,
  pub weight: u32,
}

// ─── Pure layout ─────────────────────────────────────────────────────────────

/// Greedy binning of item weights against `budget`. A page closes as soon as
/// the next item would overflow it; items are never split. An item heavier
/// than the whole budget gets a page of its own.
pub fn bin_items(weights: &[u32], budget: u32) -> Vec<Vec<usize>> {
  let mut pages: Vec<Vec<usize>> = Vec::new();
  let mut current: Vec<usize> = Vec::new();
  let mut used = 0u32;

  for (index, &weight) in weights.iter().enumerate() {
    if !current.is_empty() && used + weight > budget {
      pages.push(std::mem::take(&mut current));
      used = 0;
    }
    current.push(index);
    used += weight;
  }
  if !current.is_empty() {
    pages.push(current);
  }
  pages
}

/// Greedy word wrap at `width` characters. Words longer than `width` are
/// hard-split on character boundaries.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();
  let mut line = String::new();
  let mut line_chars = 0;

  for word in text.split_whitespace() {
    let mut word = word;
    let mut word_chars = word.chars().count();
    while word_chars > width {
      if !line.is_empty() {
        lines.push(std::mem::take(&mut line));
        line_chars = 0;
      }
      let split = word
        .char_indices()
        .nth(width)
        .map_or(word.len(), |(at, _)| at);
      let (head, tail) = word.split_at(split);
      lines.push(head.to_owned());
      word = tail;
      word_chars -= width;
    }
    if line.is_empty() {
      line.push_str(word);
      line_chars = word_chars;
    } else if line_chars + 1 + word_chars <= width {
      line.push(' ');
      line.push_str(word);
      line_chars += 1 + word_chars;
    } else {
      lines.push(std::mem::take(&mut line));
      line.push_str(word);
      line_chars = word_chars;
    }
  }
  if !line.is_empty() {
    lines.push(line);
  }
  lines
}

// ─── Engine ──────────────────────────────────────────────────────────────────

impl SignaturePlacementEngine {
  /// Append the signature-record annex: participant cards two per page, then
  /// validation items binned by [`PAGE_BUDGET`].
  pub fn append_annex(
    &self,
    pdf: &[u8],
    context: &AnnexContext,
    cards: &[ParticipantCard],
    validations: &[ValidationItem],
  ) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf)?;
    let pages_id = pages_root(&doc)?;

    let qr_id = match &context.final_url {
      Some(url) => match qr_xobject(&mut doc, url) {
        Ok(id) => Some(id),
        Err(error) => {
          warn!(%error, "could not render annex QR code, skipping");
          None
        }
      },
      None => None,
    };

    for page_cards in cards.chunks(CARDS_PER_PAGE) {
      let mut ops = header_operations(context, qr_id.is_some());
      let mut y = PAGE_HEIGHT - MARGIN - HEADER_HEIGHT;
      for card in page_cards {
        ops.extend(card_operations(card, y));
        y -= CARD_HEIGHT + 16.0;
      }
      add_annex_page(&mut doc, pages_id, qr_id, ops)?;
    }

    let weights: Vec<u32> = validations.iter().map(|v| v.weight).collect();
    for page_indices in bin_items(&weights, PAGE_BUDGET) {
      let mut ops = header_operations(context, qr_id.is_some());
      let mut y = PAGE_HEIGHT - MARGIN - HEADER_HEIGHT;
      for index in page_indices {
        let item = &validations[index];
        ops.extend(validation_operations(item, y));
        y -= f64::from(item.weight);
      }
      add_annex_page(&mut doc, pages_id, qr_id, ops)?;
    }

    save_document(&mut doc)
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn text(font: &str, size: f64, x: f64, y: f64, s: &str) -> Vec<Operation> {
  vec![
    Operation::new("BT", vec![]),
    Operation::new("Tf", vec![Object::Name(font.into()), real(size)]),
    Operation::new("Td", vec![real(x), real(y)]),
    Operation::new("Tj", vec![Object::string_literal(s)]),
    Operation::new("ET", vec![]),
  ]
}

fn border(x: f64, y: f64, w: f64, h: f64) -> Vec<Operation> {
  vec![
    Operation::new("q", vec![]),
    Operation::new("RG", vec![real(0.7), real(0.7), real(0.7)]),
    Operation::new("w", vec![real(0.75)]),
    Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
    Operation::new("S", vec![]),
    Operation::new("Q", vec![]),
  ]
}

/// Header: logo slot top-left, QR top-right, filename / id / hash lines.
fn header_operations(context: &AnnexContext, with_qr: bool) -> Vec<Operation> {
  let top = PAGE_HEIGHT - MARGIN;
  let mut ops = Vec::new();

  // Logo slot.
  ops.extend(border(MARGIN, top - 40.0, 96.0, 40.0));
  ops.extend(text("F2", 10.0, MARGIN + 8.0, top - 26.0, "Signet"));

  if with_qr {
    let qr_size = 64.0;
    let qr_x = PAGE_WIDTH - MARGIN - qr_size;
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("cm", vec![
      real(qr_size), real(0.0), real(0.0), real(qr_size),
      real(qr_x), real(top - qr_size),
    ]));
    ops.push(Operation::new("Do", vec![Object::Name(b"Qr".to_vec())]));
    ops.push(Operation::new("Q", vec![]));
  }

  let mut y = top - 58.0;
  ops.extend(text("F2", 11.0, MARGIN, y, &context.filename));
  y -= 14.0;
  ops.extend(text(
    "F1",
    9.0,
    MARGIN,
    y,
    &format!("Document ID: {}", context.document_id),
  ));
  if let Some(hash) = &context.content_hash {
    for line in wrap_text(&format!("Hash: {hash}"), WRAP_WIDTH) {
      y -= 11.0;
      ops.extend(text("F1", 8.0, MARGIN, y, &line));
    }
  }
  ops
}

fn card_operations(card: &ParticipantCard, top: f64) -> Vec<Operation> {
  let width = PAGE_WIDTH - 2.0 * MARGIN;
  let mut ops = border(MARGIN, top - CARD_HEIGHT, width, CARD_HEIGHT);

  let x = MARGIN + 12.0;
  let mut y = top - 22.0;
  ops.extend(text("F2", 12.0, x, y, &card.name));
  y -= 15.0;
  ops.extend(text("F1", 9.0, x, y, &card.email));

  if let Some(at) = card.signed_at {
    y -= 13.0;
    ops.extend(text(
      "F1",
      9.0,
      x,
      y,
      &format!("Signed at: {}", at.to_rfc3339()),
    ));
  }
  if let Some(ip) = &card.ip {
    y -= 13.0;
    ops.extend(text("F1", 9.0, x, y, &format!("IP: {ip}")));
  }
  if let Some(agent) = &card.user_agent {
    for line in wrap_text(&format!("Agent: {agent}"), WRAP_WIDTH) {
      y -= 13.0;
      ops.extend(text("F1", 9.0, x, y, &line));
    }
  }
  if !card.chips.is_empty() {
    let chips: Vec<String> =
      card.chips.iter().map(|c| format!("[{c}]")).collect();
    y -= 15.0;
    ops.extend(text("F2", 9.0, x, y, &chips.join(" ")));
  }
  ops
}

fn validation_operations(item: &ValidationItem, top: f64) -> Vec<Operation> {
  let width = PAGE_WIDTH - 2.0 * MARGIN;
  let height = f64::from(item.weight) - 10.0;
  let mut ops = border(MARGIN, top - height, width, height);

  let x = MARGIN + 12.0;
  let mut y = top - 20.0;
  ops.extend(text("F2", 11.0, x, y, &item.title));
  for raw in &item.lines {
    for line in wrap_text(raw, WRAP_WIDTH) {
      y -= 13.0;
      ops.extend(text("F1", 9.0, x, y, &line));
    }
  }
  ops
}

// ─── lopdf plumbing ──────────────────────────────────────────────────────────

fn pages_root(doc: &Document) -> Result<ObjectId> {
  Ok(doc.catalog()?.get(b"Pages")?.as_reference()?)
}

fn qr_xobject(doc: &mut Document, url: &str) -> Result<ObjectId> {
  let code = qrcode::QrCode::new(url.as_bytes())?;
  let luma = code
    .render::<image::Luma<u8>>()
    .min_dimensions(128, 128)
    .build();
  let rgba = image::DynamicImage::ImageLuma8(luma).to_rgba8();
  add_jpeg_xobject(doc, &rgba)
}

fn annex_resources(qr_id: Option<ObjectId>) -> Dictionary {
  let mut resources = dictionary! {
    "Font" => dictionary! {
      "F1" => dictionary! {
        "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica",
      },
      "F2" => dictionary! {
        "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica-Bold",
      },
    },
  };
  if let Some(id) = qr_id {
    resources.set("XObject", dictionary! { "Qr" => id });
  }
  resources
}

fn add_annex_page(
  doc: &mut Document,
  pages_id: ObjectId,
  qr_id: Option<ObjectId>,
  operations: Vec<Operation>,
) -> Result<()> {
  let content = Content { operations }.encode()?;
  let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

  let page_id = doc.add_object(dictionary! {
    "Type" => "Page",
    "Parent" => pages_id,
    "Resources" => annex_resources(qr_id),
    "MediaBox" => vec![
      real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT),
    ],
    "Contents" => content_id,
  });

  let pages = doc
    .get_object_mut(pages_id)
    .and_then(Object::as_dict_mut)
    .map_err(Error::Pdf)?;

  let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
  pages.set("Count", count + 1);
  pages
    .get_mut(b"Kids")
    .and_then(Object::as_array_mut)
    .map_err(Error::Pdf)?
    .push(Object::Reference(page_id));

  Ok(())
}
