use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A document expected to exist was not found.
    #[error("Document not found")]
    NotFound,

    /// An array operation targeted a field that is not an array.
    #[error("Field '{field}' is not an array")]
    NotAnArray { field: String },

    /// Serde (de)serialization failure on a document tree.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic I/O error from the blob backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob uploads must carry a payload.
    #[error("Empty blob")]
    EmptyBlob,

    /// Blob payload exceeds the configured ceiling.
    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    /// No blob stored under the given URL.
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// The URL does not name a blob in this store.
    #[error("Invalid blob URL: {0}")]
    InvalidBlobUrl(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
