//! # confab-shared
//!
//! Domain types shared by every confab crate: user and conversation
//! identifiers, the document models persisted in the remote store, and the
//! constants that govern previews, upload limits and presence.

pub mod constants;
pub mod models;
pub mod types;

pub use models::*;
pub use types::{ConversationId, UserId};
