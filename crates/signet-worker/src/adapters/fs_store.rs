//! Filesystem-backed object storage.

use std::{io, path::PathBuf, time::Duration};

use signet_core::{
  clients::{ObjectStorage, StoredObject},
  Error as CoreError, Result,
};
use uuid::Uuid;

/// Stores objects as flat files under a root directory. Keys are generated
/// on upload and opaque to callers; "presigned" URLs are `file://` paths.
pub struct FsObjectStore {
  root: PathBuf,
}

impl FsObjectStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  fn path_for(&self, key: &str) -> PathBuf { self.root.join(key) }
}

fn extension(content_type: &str) -> &'static str {
  match content_type {
    "application/pdf" => "pdf",
    "image/png" => "png",
    "image/jpeg" => "jpg",
    _ => "bin",
  }
}

fn unavailable(action: &str, error: io::Error) -> CoreError {
  CoreError::ServiceUnavailable(format!("object {action} failed: {error}"))
}

impl ObjectStorage for FsObjectStore {
  async fn upload(
    &self,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<StoredObject> {
    let key =
      format!("{}.{}", Uuid::new_v4().simple(), extension(content_type));
    let path = self.path_for(&key);

    tokio::fs::create_dir_all(&self.root)
      .await
      .map_err(|e| unavailable("write", e))?;
    tokio::fs::write(&path, bytes)
      .await
      .map_err(|e| unavailable("write", e))?;

    Ok(StoredObject {
      url: Some(format!("file://{}", path.display())),
      key,
    })
  }

  async fn download(&self, key: &str) -> Result<Vec<u8>> {
    tokio::fs::read(self.path_for(key))
      .await
      .map_err(|e| unavailable("read", e))
  }

  async fn presigned_url(&self, key: &str, _ttl: Duration) -> Result<String> {
    Ok(format!("file://{}", self.path_for(key).display()))
  }

  async fn delete(&self, key: &str) -> Result<()> {
    match tokio::fs::remove_file(self.path_for(key)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(unavailable("delete", e)),
    }
  }
}
