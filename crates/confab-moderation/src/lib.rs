//! # confab-moderation
//!
//! Text classification gate for outgoing messages.
//!
//! A [`Moderator`] takes the raw message text and returns a [`Verdict`]
//! wrapping the classifier's label.  The send path treats any label
//! containing `"Hateful"` or `"Offensive"` (case-sensitive substring) as a
//! hard block: the message is never persisted.
//!
//! Two implementations are provided: [`HttpModerator`] calls a hosted
//! classifier over HTTP, and [`LexiconModerator`] is an offline word-list
//! fallback producing the same label vocabulary.

pub mod http;
pub mod lexicon;

mod error;

pub use error::ModerationError;
pub use http::HttpModerator;
pub use lexicon::LexiconModerator;

use async_trait::async_trait;

/// Label substrings that turn a verdict into a hard block.
pub const BLOCKING_LABELS: [&str; 2] = ["Hateful", "Offensive"];

/// Classification result for one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    label: String,
}

impl Verdict {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// The raw classifier label, surfaced verbatim to the user on a block.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether this verdict blocks delivery.
    pub fn is_blocked(&self) -> bool {
        BLOCKING_LABELS.iter().any(|l| self.label.contains(l))
    }
}

/// The seam between the send path and the remote classification service.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Verdict, ModerationError>;
}
