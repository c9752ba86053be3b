//! Stamping signatures and the content-integrity hash into PDF pages.

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageBuffer, Rgba, RgbaImage};
use lopdf::{
  content::{Content, Operation},
  dictionary, Document, Object, ObjectId, Stream,
};
use rusttype::{point, Font, Scale};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::{
  fonts::{fit_size, text_width, FontCatalog},
  geometry::map_placement,
  Error, Result,
};
use signet_core::signature::Placement;

const AUDIT_FONT_SIZE: f64 = 6.0;
const ENVELOPE_FONT_SIZE: f64 = 7.0;
const MIN_TEXT_SIGNATURE_SIZE: f32 = 6.0;
/// Rasterisation oversampling factor for typed signatures.
const IMAGE_SCALE: f32 = 2.0;
const PAGE_FONT_NAME: &[u8] = b"FSignet";

fn real(value: f64) -> Object { Object::Real(value as f32) }

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// The resolved artwork for one signature slot. Asset bytes are fetched by
/// the caller; the engine itself performs no I/O.
pub enum SignatureArt {
  /// Decoded-on-stamp image bytes (PNG or JPEG).
  Image { bytes: Vec<u8> },
  /// A typed signature to rasterise in a decorative face.
  Text {
    text:  String,
    font:  String,
    color: String,
  },
}

/// One signature ready to stamp.
pub struct SignatureAsset {
  pub participant:   Uuid,
  pub placement:     Placement,
  pub canvas_width:  f64,
  pub canvas_height: f64,
  pub art:           SignatureArt,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct SignaturePlacementEngine {
  fonts: FontCatalog,
}

impl SignaturePlacementEngine {
  pub fn new(fonts: FontCatalog) -> Self { Self { fonts } }

  /// Stamp every asset into the document. A decoration asset that cannot be
  /// rendered (undecodable image, no usable font) is logged and skipped;
  /// the pass never aborts the document over one.
  pub fn stamp_signatures(
    &self,
    pdf: &[u8],
    assets: &[SignatureAsset],
  ) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
      return Err(Error::NoPages);
    }

    for (index, asset) in assets.iter().enumerate() {
      let Some(&page_id) = pages.get(asset.placement.slide_index as usize)
      else {
        warn!(
          participant = %asset.participant,
          slide_index = asset.placement.slide_index,
          "placement targets a page the document does not have, skipping"
        );
        continue;
      };

      if let Err(error) = self.stamp_one(&mut doc, page_id, index, asset) {
        warn!(
          participant = %asset.participant,
          %error,
          "failed to stamp signature, skipping"
        );
      }
    }

    save_document(&mut doc)
  }

  /// Compute SHA-256 over `pdf` and write `Envelope ID: <hex>` top-left on
  /// every page. Returns the stamped bytes and the hex digest; the digest is
  /// the document's content-integrity hash.
  pub fn stamp_envelope_id(&self, pdf: &[u8]) -> Result<(Vec<u8>, String)> {
    let hash = hex::encode(Sha256::digest(pdf));

    let mut doc = Document::load_mem(pdf)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
      return Err(Error::NoPages);
    }

    for page_id in pages {
      let (_, page_h) = page_size(&doc, page_id);
      ensure_page_font(&mut doc, page_id)?;
      append_operations(&mut doc, page_id, vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![
          Object::Name(PAGE_FONT_NAME.to_vec()),
          real(ENVELOPE_FONT_SIZE),
        ]),
        Operation::new("Td", vec![real(20.0), real(page_h - 15.0)]),
        Operation::new(
          "Tj",
          vec![Object::string_literal(format!("Envelope ID: {hash}"))],
        ),
        Operation::new("ET", vec![]),
      ])?;
    }

    Ok((save_document(&mut doc)?, hash))
  }

  // ── One asset ─────────────────────────────────────────────────────────────

  fn stamp_one(
    &self,
    doc: &mut Document,
    page_id: ObjectId,
    index: usize,
    asset: &SignatureAsset,
  ) -> Result<()> {
    let (page_w, page_h) = page_size(doc, page_id);
    let rect = map_placement(
      &asset.placement,
      asset.canvas_width,
      asset.canvas_height,
      page_w,
      page_h,
    );

    let rendered = match &asset.art {
      SignatureArt::Image { bytes } => {
        image::load_from_memory(bytes)?.to_rgba8()
      }
      SignatureArt::Text { text, font, color } => {
        let Some(face) = self.fonts.face(font) else {
          warn!(family = %font, "no usable font face for typed signature");
          return Ok(());
        };
        let max_width = rect.width as f32;
        let size = fit_size(
          |s| text_width(face, text, s),
          max_width,
          rect.height as f32,
          MIN_TEXT_SIGNATURE_SIZE,
        );
        render_text_image(face, text, size * IMAGE_SCALE, parse_color(color))
      }
    };

    let (img_w, img_h) = rendered.dimensions();
    if img_w == 0 || img_h == 0 {
      return Ok(());
    }

    // Typed signatures keep their natural aspect ratio and centre within the
    // box; images fill it.
    let (draw_w, draw_h, draw_x) = match asset.art {
      SignatureArt::Image { .. } => (rect.width, rect.height, rect.x),
      SignatureArt::Text { .. } => {
        let w = f64::from(img_w) / f64::from(IMAGE_SCALE);
        let h = f64::from(img_h) / f64::from(IMAGE_SCALE);
        (w, h, rect.x + (rect.width - w) / 2.0)
      }
    };
    let draw_y = page_h - rect.y - rect.height;

    let name = format!("Sig{index}");
    let xobject_id = add_jpeg_xobject(doc, &rendered)?;
    doc.add_xobject(page_id, name.as_bytes(), xobject_id)?;

    let mut ops = vec![Operation::new("q", vec![])];
    if asset.placement.rotation != 0.0 {
      let theta = asset.placement.rotation.to_radians();
      let (sin, cos) = theta.sin_cos();
      let cx = draw_x + draw_w / 2.0;
      let cy = draw_y + draw_h / 2.0;
      ops.push(Operation::new("cm", vec![
        real(1.0), real(0.0), real(0.0), real(1.0), real(cx), real(cy),
      ]));
      ops.push(Operation::new("cm", vec![
        real(cos), real(sin), real(-sin), real(cos), real(0.0), real(0.0),
      ]));
      ops.push(Operation::new("cm", vec![
        real(draw_w), real(0.0), real(0.0), real(draw_h),
        real(-draw_w / 2.0), real(-draw_h / 2.0),
      ]));
    } else {
      ops.push(Operation::new("cm", vec![
        real(draw_w), real(0.0), real(0.0), real(draw_h),
        real(draw_x), real(draw_y),
      ]));
    }
    ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
    ops.push(Operation::new("Q", vec![]));

    ops.extend(audit_box_operations(
      rect.x,
      page_h - rect.y - rect.height,
      rect.width,
      rect.height,
      asset.participant,
    ));

    ensure_page_font(doc, page_id)?;
    append_operations(doc, page_id, ops)
  }
}

// ─── Audit box ───────────────────────────────────────────────────────────────

/// Bordered box around the stamped area with a "Signed by" mark and a
/// truncated participant token.
fn audit_box_operations(
  x: f64,
  y: f64,
  w: f64,
  h: f64,
  participant: Uuid,
) -> Vec<Operation> {
  let token: String =
    participant.simple().to_string().chars().take(8).collect();

  vec![
    Operation::new("q", vec![]),
    Operation::new("RG", vec![real(0.6), real(0.6), real(0.6)]),
    Operation::new("w", vec![real(0.75)]),
    Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
    Operation::new("S", vec![]),
    Operation::new("Q", vec![]),
    Operation::new("BT", vec![]),
    Operation::new("Tf", vec![
      Object::Name(PAGE_FONT_NAME.to_vec()),
      real(AUDIT_FONT_SIZE),
    ]),
    Operation::new("Td", vec![real(x), real(y - AUDIT_FONT_SIZE - 2.0)]),
    Operation::new(
      "Tj",
      vec![Object::string_literal(format!("Signed by {token}"))],
    ),
    Operation::new("ET", vec![]),
  ]
}

// ─── Rasterisation ───────────────────────────────────────────────────────────

fn parse_color(color: &str) -> Rgba<u8> {
  let hex_part = color.trim_start_matches('#');
  if hex_part.len() == 6 {
    if let Ok(bytes) = hex::decode(hex_part) {
      return Rgba([bytes[0], bytes[1], bytes[2], 255]);
    }
  }
  Rgba([0, 0, 0, 255])
}

/// Rasterise one line of text onto a white background.
fn render_text_image(
  font: &Font<'_>,
  text: &str,
  size_px: f32,
  color: Rgba<u8>,
) -> RgbaImage {
  const PADDING: i32 = 8;
  let background = Rgba([255u8, 255, 255, 255]);

  let scale = Scale::uniform(size_px);
  let v_metrics = font.v_metrics(scale);
  let glyphs: Vec<_> =
    font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();

  let mut min_x = i32::MAX;
  let mut max_x = i32::MIN;
  let mut min_y = i32::MAX;
  let mut max_y = i32::MIN;
  for glyph in &glyphs {
    if let Some(bb) = glyph.pixel_bounding_box() {
      min_x = min_x.min(bb.min.x);
      max_x = max_x.max(bb.max.x);
      min_y = min_y.min(bb.min.y);
      max_y = max_y.max(bb.max.y);
    }
  }
  if min_x > max_x {
    return ImageBuffer::from_pixel(1, 1, background);
  }

  let width = ((max_x - min_x) + PADDING * 2).max(1) as u32;
  let height = ((max_y - min_y) + PADDING * 2).max(1) as u32;
  let mut image = ImageBuffer::from_pixel(width, height, background);

  let offset_x = PADDING - min_x;
  let offset_y = PADDING - min_y;
  for glyph in &glyphs {
    if let Some(bb) = glyph.pixel_bounding_box() {
      glyph.draw(|gx, gy, coverage| {
        let px = bb.min.x + gx as i32 + offset_x;
        let py = bb.min.y + gy as i32 + offset_y;
        if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
          let pixel = image.get_pixel_mut(px as u32, py as u32);
          for channel in 0..3 {
            let blended = f32::from(color[channel]) * coverage
              + f32::from(pixel[channel]) * (1.0 - coverage);
            pixel[channel] = blended.round() as u8;
          }
        }
      });
    }
  }

  image
}

// ─── lopdf plumbing ──────────────────────────────────────────────────────────

/// JPEG-encode an RGBA buffer and register it as an image XObject.
pub(crate) fn add_jpeg_xobject(
  doc: &mut Document,
  image: &RgbaImage,
) -> Result<ObjectId> {
  let (width, height) = image.dimensions();
  let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();

  let mut jpeg = Vec::new();
  JpegEncoder::new_with_quality(&mut jpeg, 90).encode(
    rgb.as_raw(),
    width,
    height,
    image::ExtendedColorType::Rgb8,
  )?;

  Ok(doc.add_object(Stream::new(
    dictionary! {
      "Type" => "XObject",
      "Subtype" => "Image",
      "Width" => i64::from(width),
      "Height" => i64::from(height),
      "ColorSpace" => "DeviceRGB",
      "BitsPerComponent" => 8,
      "Filter" => "DCTDecode",
    },
    jpeg,
  )))
}

/// Append encoded operations to an existing page's content stream.
pub(crate) fn append_operations(
  doc: &mut Document,
  page_id: ObjectId,
  operations: Vec<Operation>,
) -> Result<()> {
  let mut content = doc.get_page_content(page_id)?;
  content.push(b'\n');
  content.extend(Content { operations }.encode()?);
  doc.change_page_content(page_id, content)?;
  Ok(())
}

/// Make a Helvetica face available on the page under [`PAGE_FONT_NAME`].
pub(crate) fn ensure_page_font(
  doc: &mut Document,
  page_id: ObjectId,
) -> Result<()> {
  let font_id = doc.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "Type1",
    "BaseFont" => "Helvetica",
  });

  let resources = doc.get_or_create_resources(page_id)?;
  let resources = resources.as_dict_mut()?;
  if !resources.has(b"Font") {
    resources.set("Font", lopdf::Dictionary::new());
  }
  let fonts = resources.get_mut(b"Font")?.as_dict_mut()?;
  fonts.set(PAGE_FONT_NAME, Object::Reference(font_id));
  Ok(())
}

/// Page dimensions from the MediaBox, defaulting to US Letter.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
  let media_box = doc
    .get_object(page_id)
    .and_then(Object::as_dict)
    .and_then(|d| d.get(b"MediaBox"))
    .and_then(Object::as_array);

  if let Ok(values) = media_box {
    let nums: Vec<f64> = values.iter().filter_map(object_as_f64).collect();
    if nums.len() == 4 {
      return (nums[2] - nums[0], nums[3] - nums[1]);
    }
  }
  (612.0, 792.0)
}

fn object_as_f64(object: &Object) -> Option<f64> {
  match object {
    Object::Integer(i) => Some(*i as f64),
    Object::Real(r) => Some(f64::from(*r)),
    _ => None,
  }
}

pub(crate) fn save_document(doc: &mut Document) -> Result<Vec<u8>> {
  let mut bytes = Vec::new();
  doc.save_to(&mut bytes)?;
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn minimal_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
      operations: vec![
        Operation::new("BT", vec![]),
        Operation::new("ET", vec![]),
      ],
    };
    let content_id =
      doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
      "Contents" => content_id,
    });
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
      }),
    );
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
  }

  fn engine() -> SignaturePlacementEngine {
    SignaturePlacementEngine::new(FontCatalog::empty())
  }

  fn png_bytes() -> Vec<u8> {
    let img: RgbaImage = ImageBuffer::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
      .write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
      )
      .unwrap();
    bytes
  }

  fn asset(slide_index: u32, art: SignatureArt) -> SignatureAsset {
    SignatureAsset {
      participant: Uuid::new_v4(),
      placement: Placement {
        slide_index,
        top: 0.5,
        left: 0.5,
        width: 200.0,
        height: 80.0,
        rotation: 0.0,
      },
      canvas_width: 1000.0,
      canvas_height: 1000.0,
      art,
    }
  }

  #[test]
  fn envelope_id_hash_matches_input_bytes() {
    let pdf = minimal_pdf();
    let expected = hex::encode(Sha256::digest(&pdf));

    let (stamped, hash) = engine().stamp_envelope_id(&pdf).unwrap();
    assert_eq!(hash, expected);
    assert_ne!(stamped, pdf);

    // The stamped bytes still parse and carry the hash text.
    let doc = Document::load_mem(&stamped).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    let text = String::from_utf8_lossy(&content);
    assert!(text.contains("Envelope ID"));
  }

  #[test]
  fn image_signature_stamps_an_xobject() {
    let pdf = minimal_pdf();
    let stamped = engine()
      .stamp_signatures(&pdf, &[asset(0, SignatureArt::Image {
        bytes: png_bytes(),
      })])
      .unwrap();

    let doc = Document::load_mem(&stamped).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    let text = String::from_utf8_lossy(&content);
    assert!(text.contains("Sig0"));
    assert!(text.contains("Signed by"));
  }

  #[test]
  fn out_of_range_page_is_skipped_not_fatal() {
    let pdf = minimal_pdf();
    let stamped = engine()
      .stamp_signatures(&pdf, &[asset(9, SignatureArt::Image {
        bytes: png_bytes(),
      })])
      .unwrap();
    assert!(Document::load_mem(&stamped).is_ok());
  }

  #[test]
  fn typed_signature_without_fonts_is_skipped_not_fatal() {
    let pdf = minimal_pdf();
    let stamped = engine()
      .stamp_signatures(&pdf, &[asset(0, SignatureArt::Text {
        text:  "Ada".into(),
        font:  "great_vibes".into(),
        color: "#102030".into(),
      })])
      .unwrap();

    let doc = Document::load_mem(&stamped).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    assert!(!String::from_utf8_lossy(&content).contains("Sig0"));
  }

  #[test]
  fn undecodable_image_is_skipped_not_fatal() {
    let pdf = minimal_pdf();
    let stamped = engine()
      .stamp_signatures(&pdf, &[asset(0, SignatureArt::Image {
        bytes: vec![0xde, 0xad, 0xbe, 0xef],
      })])
      .unwrap();
    assert!(Document::load_mem(&stamped).is_ok());
  }

  #[test]
  fn color_parsing_falls_back_to_black() {
    assert_eq!(parse_color("#ff0000"), Rgba([255, 0, 0, 255]));
    assert_eq!(parse_color("ff0000"), Rgba([255, 0, 0, 255]));
    assert_eq!(parse_color("tomato"), Rgba([0, 0, 0, 255]));
  }
}
