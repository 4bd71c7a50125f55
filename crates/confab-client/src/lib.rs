//! # confab-client
//!
//! The client core of the confab one-to-one chat application:
//!
//! - **Conversation sync engine** ([`sync::ChatEngine`]): moderated sends,
//!   the dual chat-list bump that keeps both participants' summary entries
//!   consistent with the shared message log, live message subscriptions,
//!   and read receipts.
//! - **Directory** ([`directory::Directory`]): handle lookup and
//!   conversation creation.
//! - **Profile** ([`profile::Profiles`]): display name / bio / avatar
//!   updates and the presence heartbeat.
//!
//! The crate has no process boundary of its own; it is meant to be embedded
//! in a UI shell that owns the [`state::AppState`] and drives the engine.

pub mod directory;
pub mod profile;
pub mod state;
pub mod sync;

mod error;

pub use directory::{Directory, LookupOutcome};
pub use error::{ClientError, SendError};
pub use profile::Profiles;
pub use state::{AppState, OpenConversation, Session, UploadState};
pub use sync::{ChatEngine, ConversationFeed, SendOutcome};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the default tracing subscriber (respects `RUST_LOG`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("confab_client=debug,confab_store=info,confab_moderation=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
