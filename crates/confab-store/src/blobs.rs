//! Filesystem-backed blob store.
//!
//! Stand-in for the remote blob service: accepts a binary payload and
//! returns a stable `blob:///<uuid>` retrieval URL.  Payloads are written
//! under a UUID file name inside the base directory, so stored names can
//! never escape it.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// URL scheme under which stored blobs are addressed.
pub const BLOB_URL_PREFIX: &str = "blob:///";

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    /// Open the store, creating the base directory if missing.
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;
        info!(path = %base_path.display(), max_size, "Blob store initialized");
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store a payload and return its retrieval URL.
    pub async fn put(&self, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(StoreError::EmptyBlob);
        }
        if data.len() > self.max_size {
            return Err(StoreError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.base_path.join(id.to_string());
        fs::write(&path, data).await?;

        debug!(id = %id, size = data.len(), "Stored blob");
        Ok(format!("{BLOB_URL_PREFIX}{id}"))
    }

    /// Retrieve a payload by the URL returned from [`BlobStore::put`].
    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let id = parse_blob_url(url)?;
        let path = self.base_path.join(id.to_string());

        if !path.exists() {
            return Err(StoreError::BlobNotFound(url.to_string()));
        }

        let data = fs::read(&path).await?;
        debug!(id = %id, size = data.len(), "Retrieved blob");
        Ok(data)
    }

    /// Delete a stored payload.
    pub async fn delete(&self, url: &str) -> Result<()> {
        let id = parse_blob_url(url)?;
        let path = self.base_path.join(id.to_string());

        if !path.exists() {
            return Err(StoreError::BlobNotFound(url.to_string()));
        }

        fs::remove_file(&path).await?;
        debug!(id = %id, "Deleted blob");
        Ok(())
    }
}

fn parse_blob_url(url: &str) -> Result<Uuid> {
    let id = url
        .strip_prefix(BLOB_URL_PREFIX)
        .ok_or_else(|| StoreError::InvalidBlobUrl(url.to_string()))?;
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidBlobUrl(url.to_string()))
}
