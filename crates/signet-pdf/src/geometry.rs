//! Coordinate mapping from editor placements to PDF page points.
//!
//! The editor reports the *centre* of a placement box as fractions of its
//! canvas, plus the box size in canvas pixels at capture time. This module
//! maps those into page points; everything here is pure and unit-tested.

use signet_core::signature::Placement;

/// Fixed design constant applied to both stamped dimensions.
pub const SCALE_FACTOR: f64 = 0.8;

/// A mapped rectangle in page points, top-left origin (y grows downward,
/// matching the editor). Use [`PageRect::pdf_bottom_y`] when emitting PDF
/// operators, which measure from the bottom of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
  pub x:      f64,
  pub y:      f64,
  pub width:  f64,
  pub height: f64,
}

impl PageRect {
  /// The rectangle's bottom edge in PDF coordinates (origin bottom-left).
  pub fn pdf_bottom_y(&self, page_height: f64) -> f64 {
    page_height - self.y - self.height
  }
}

/// Map a placement onto a page of the given size.
///
/// `canvas_width`/`canvas_height` are the editor canvas dimensions recorded
/// with the rendition. The centre point scales with the page; the box size
/// scales with the canvas-to-page ratio times [`SCALE_FACTOR`].
pub fn map_placement(
  placement: &Placement,
  canvas_width: f64,
  canvas_height: f64,
  page_width: f64,
  page_height: f64,
) -> PageRect {
  let center_x = placement.left * page_width;
  let center_y = placement.top * page_height;

  let scaled_w = placement.width / canvas_width * page_width * SCALE_FACTOR;
  let scaled_h = placement.height / canvas_height * page_height * SCALE_FACTOR;

  PageRect {
    x:      center_x - scaled_w / 2.0,
    y:      center_y - scaled_h / 2.0,
    width:  scaled_w,
    height: scaled_h,
  }
}
