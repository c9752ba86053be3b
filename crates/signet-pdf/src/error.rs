//! Error type for `signet-pdf`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("pdf error: {0}")]
  Pdf(#[from] lopdf::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("image error: {0}")]
  Image(#[from] image::ImageError),

  #[error("qr encoding error: {0}")]
  Qr(#[from] qrcode::types::QrError),

  #[error("document has no pages")]
  NoPages,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
