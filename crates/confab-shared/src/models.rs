//! Domain model structs stored as documents in the remote document store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it round-trips
//! through the JSON document tree, and field names follow the wire shape
//! (camelCase) used by the hosted backend.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{IMAGE_PREVIEW, ONLINE_WINDOW_SECS, PREVIEW_MAX_CHARS};
use crate::types::{ConversationId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.  One document per user in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque id issued by the session provider; also the document id.
    pub id: UserId,
    /// Unique handle, lowercase-normalized at registration.
    pub username: String,
    /// Display name shown to counterparts.
    pub name: String,
    /// Avatar retrieval URL.
    pub avatar: String,
    /// Free-form profile bio.
    pub bio: String,
    /// Last presence heartbeat.
    pub last_seen: DateTime<Utc>,
}

impl User {
    /// Whether the user counts as online at `now` (70-second window).
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_seen) <= Duration::seconds(ONLINE_WINDOW_SECS)
    }

    /// Display snapshot embedded into the counterpart's chat-list entry.
    pub fn profile(&self) -> CounterpartProfile {
        CounterpartProfile {
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Message content: exactly one of `text` or `image` is present on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageBody {
    Text { text: String },
    Image { image: String },
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { image: url.into() }
    }

    /// The chat-list preview for this body: the first 30 characters of a
    /// text message, or the literal string `"image"`.
    pub fn preview(&self) -> String {
        match self {
            Self::Text { text } => text.chars().take(PREVIEW_MAX_CHARS).collect(),
            Self::Image { .. } => IMAGE_PREVIEW.to_string(),
        }
    }
}

/// A single chat message.  Immutable once appended; the append order of the
/// conversation document is the chronological order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Sender's user id.
    pub sender: UserId,
    /// Text or image payload.
    #[serde(flatten)]
    pub body: MessageBody,
    /// Client timestamp at send time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// The shared message log of one conversation.  One document per pair of
/// participants in the `messages` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDoc {
    pub created_at: DateTime<Utc>,
    /// Append-only, server-ordered message sequence.
    pub messages: Vec<Message>,
}

impl ConversationDoc {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            messages: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat list
// ---------------------------------------------------------------------------

/// Counterpart display data duplicated into a chat-list entry so the list
/// renders without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartProfile {
    pub name: String,
    pub avatar: String,
}

/// Per-user, per-conversation derived summary record.  Two independent
/// copies exist, one in each participant's chat-list document, and every
/// sender-side write must keep both consistent with the message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatListEntry {
    /// Id of the shared conversation document.
    pub conversation_id: ConversationId,
    /// The other participant, from the owning user's perspective.
    pub counterpart_id: UserId,
    /// Counterpart display snapshot.
    pub counterpart: CounterpartProfile,
    /// Preview of the newest message (30 chars of text, or "image").
    pub last_message: String,
    /// Client timestamp of the newest activity.
    pub updated_at: DateTime<Utc>,
    /// Cleared on the recipient's copy by every incoming message; set back
    /// by the recipient opening the conversation.
    pub message_seen: bool,
}

/// The whole per-user chat-list document in the `chats` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatList {
    pub chats: Vec<ChatListEntry>,
}

impl ChatList {
    pub fn entry(&self, conversation_id: ConversationId) -> Option<&ChatListEntry> {
        self.chats
            .iter()
            .find(|c| c.conversation_id == conversation_id)
    }

    pub fn entry_mut(&mut self, conversation_id: ConversationId) -> Option<&mut ChatListEntry> {
        self.chats
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
    }

    /// Whether a conversation with `counterpart_id` already exists.
    pub fn has_counterpart(&self, counterpart_id: &UserId) -> bool {
        self.chats.iter().any(|c| &c.counterpart_id == counterpart_id)
    }
}
