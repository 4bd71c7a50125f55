use thiserror::Error;

use confab_moderation::ModerationError;
use confab_store::StoreError;

/// Errors surfaced by the send path.  Each failure is scoped to the single
/// user action that triggered it; nothing here is fatal to the process.
#[derive(Error, Debug)]
pub enum SendError {
    /// The moderation gate classified the text as hateful or offensive.
    /// Carries the classifier's label verbatim for display.
    #[error("Message blocked by moderation: {0}")]
    Blocked(String),

    /// Image payload exceeds the 2 MiB ceiling; rejected before any
    /// remote call.
    #[error("Image too large: {size} bytes (max 2 MiB)")]
    ImageTooLarge { size: usize },

    /// The blob upload failed; the optimistic placeholder has been
    /// removed from local state.
    #[error("Image upload failed: {0}")]
    Upload(#[source] StoreError),

    /// No conversation document exists under the given id.
    #[error("No conversation document for this chat")]
    NoConversation,

    /// Other document-store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The classification service could not be reached or answered
    /// malformed data.
    #[error("Moderation error: {0}")]
    Moderation(#[from] ModerationError),
}

/// Errors from the directory and profile paths.
#[derive(Error, Debug)]
pub enum ClientError {
    /// An operation that needs an authenticated session ran without one.
    #[error("Not signed in")]
    NoSession,

    /// No user document under the given id.
    #[error("User not found")]
    UserNotFound,

    /// Avatar payload exceeds the 2 MiB ceiling.
    #[error("Avatar too large: {size} bytes (max 2 MiB)")]
    AvatarTooLarge { size: usize },

    /// Document- or blob-store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
