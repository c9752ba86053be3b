//! Decorative font table for typed signatures.
//!
//! Six decorative faces plus a default sans. Faces are loaded from TTF files
//! in a fonts directory at engine construction; a face that fails to load is
//! logged and dropped, and typed signatures requesting it fall back to the
//! default. The engine never aborts a document over a missing font asset.

use std::{collections::HashMap, fs, path::Path};

use rusttype::{point, Font, Scale};
use tracing::warn;

/// Family name → TTF filename. The first entry doubles as the default sans
/// fallback face.
pub const FAMILIES: [(&str, &str); 7] = [
  ("default", "OpenSans-Regular.ttf"),
  ("great_vibes", "GreatVibes-Regular.ttf"),
  ("dancing_script", "DancingScript-Regular.ttf"),
  ("pacifico", "Pacifico-Regular.ttf"),
  ("sacramento", "Sacramento-Regular.ttf"),
  ("allura", "Allura-Regular.ttf"),
  ("satisfy", "Satisfy-Regular.ttf"),
];

/// Loaded font faces, keyed by family name.
pub struct FontCatalog {
  faces: HashMap<&'static str, Font<'static>>,
}

impl FontCatalog {
  /// Load every known family from `dir`. Missing or unparsable files are
  /// skipped with a warning.
  pub fn load(dir: impl AsRef<Path>) -> Self {
    let dir = dir.as_ref();
    let mut faces = HashMap::new();

    for (family, filename) in FAMILIES {
      let path = dir.join(filename);
      match fs::read(&path) {
        Ok(bytes) => match Font::try_from_vec(bytes) {
          Some(font) => {
            faces.insert(family, font);
          }
          None => warn!(family, path = %path.display(), "unparsable font file, skipping face"),
        },
        Err(error) => {
          warn!(family, path = %path.display(), %error, "font file unavailable, skipping face");
        }
      }
    }

    Self { faces }
  }

  /// A catalog with no faces; every typed signature will be skipped.
  pub fn empty() -> Self { Self { faces: HashMap::new() } }

  /// Resolve a family name, falling back to the default sans. `None` only
  /// when the default itself failed to load.
  pub fn face(&self, family: &str) -> Option<&Font<'static>> {
    self.faces.get(family).or_else(|| self.faces.get("default"))
  }
}

/// Width of `text` at `size` in the same units as `size`.
pub fn text_width(font: &Font<'_>, text: &str, size: f32) -> f32 {
  let scale = Scale::uniform(size);
  font
    .layout(text, scale, point(0.0, 0.0))
    .map(|g| g.unpositioned().h_metrics().advance_width)
    .sum()
}

/// Shrink from `start_size` until `measure(size) <= max_width`, never going
/// below `floor`. `measure` reports the rendered width at a given size.
pub fn fit_size(
  measure: impl Fn(f32) -> f32,
  max_width: f32,
  start_size: f32,
  floor: f32,
) -> f32 {
  let mut size = start_size;
  while size > floor && measure(size) > max_width {
    size -= 1.0;
  }
  size.max(floor)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fit_size_shrinks_until_the_text_fits() {
    // Width proportional to size: 10 units of width per size unit.
    let size = fit_size(|s| s * 10.0, 200.0, 40.0, 6.0);
    assert!(size <= 20.0);
    assert!(size * 10.0 <= 200.0);
  }

  #[test]
  fn fit_size_keeps_the_start_size_when_it_already_fits() {
    let size = fit_size(|s| s * 2.0, 200.0, 40.0, 6.0);
    assert_eq!(size, 40.0);
  }

  #[test]
  fn fit_size_never_goes_below_the_floor() {
    let size = fit_size(|_| f32::MAX, 10.0, 40.0, 6.0);
    assert_eq!(size, 6.0);
  }

  #[test]
  fn empty_catalog_resolves_nothing() {
    let catalog = FontCatalog::empty();
    assert!(catalog.face("great_vibes").is_none());
    assert!(catalog.face("default").is_none());
  }
}
