//! Application state shared with the embedding UI shell.
//!
//! The [`AppState`] struct is wrapped in `Arc<Mutex<>>` and handed to the
//! engine and to every view; each field has a single logical writer.

use confab_shared::models::{ChatListEntry, CounterpartProfile, Message, User};
use confab_shared::types::{ConversationId, UserId};

/// Authenticated session issued by the identity provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
}

/// Lifecycle of an optimistic local image entry.
///
/// `Pending` while the upload is in flight, `Committed` once the message
/// carries the real URL, `Failed` after the placeholder has been removed
/// so the UI can offer a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Committed(String),
    Failed,
}

/// The conversation currently displayed, including its locally rendered
/// message list (newest first, optimistic placeholders included).
#[derive(Debug, Clone)]
pub struct OpenConversation {
    pub conversation_id: ConversationId,
    pub counterpart_id: UserId,
    pub counterpart: CounterpartProfile,
    /// Rendered message list, newest first.
    pub messages: Vec<Message>,
    /// Image upload currently or last in flight, if any.
    pub upload: Option<UploadState>,
}

impl OpenConversation {
    pub fn from_entry(entry: &ChatListEntry) -> Self {
        Self {
            conversation_id: entry.conversation_id,
            counterpart_id: entry.counterpart_id.clone(),
            counterpart: entry.counterpart.clone(),
            messages: Vec::new(),
            upload: None,
        }
    }
}

/// Central application state.
pub struct AppState {
    /// `None` until sign-in completes.
    pub session: Option<Session>,
    /// The conversation the user is looking at; at most one at a time.
    pub open_conversation: Option<OpenConversation>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            session: None,
            open_conversation: None,
        }
    }

    pub fn sign_in(&mut self, user: User) {
        self.session = Some(Session { user });
    }

    /// Sign-out tears down every chat view, so the open conversation
    /// goes with the session.
    pub fn sign_out(&mut self) {
        self.session = None;
        self.open_conversation = None;
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
