//! # confab-store
//!
//! Storage backends for the confab client core.
//!
//! [`DocStore`] is an in-process stand-in for the hosted document database:
//! documents keyed by `(collection, id)`, whole-document writes with
//! last-writer-wins semantics, targeted field updates, an atomic set-union
//! array append, and a conflated per-document change subscription.
//!
//! [`BlobStore`] is the filesystem-backed stand-in for the remote blob
//! service: it accepts a binary payload and returns a stable retrieval URL.

pub mod blobs;
pub mod docs;

mod error;

pub use blobs::BlobStore;
pub use docs::DocStore;
pub use error::StoreError;
