//! Signature placement engine for Signet.
//!
//! Stamps signature images and typed signatures into PDF pages, writes the
//! content-integrity hash onto every page, and appends the signature-record
//! annex. Pure synchronous; operates on in-memory PDF bytes via [`lopdf`].
//! Callers on an async runtime should run the engine inside
//! `spawn_blocking`.

pub mod annex;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod stamp;

pub use error::{Error, Result};
pub use fonts::FontCatalog;
pub use stamp::{SignatureArt, SignatureAsset, SignaturePlacementEngine};
