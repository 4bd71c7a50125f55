//! Directory: handle lookup and conversation creation.
//!
//! Handles are unique and lowercase-normalized upstream, so a lookup is a
//! case-insensitive exact match returning at most one account.  Matching
//! yourself or someone you already chat with is an informational outcome,
//! not an error.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use confab_shared::constants::{CHATS_COLLECTION, MESSAGES_COLLECTION, USERS_COLLECTION};
use confab_shared::models::{ChatList, ChatListEntry, ConversationDoc, User};
use confab_shared::types::{ConversationId, UserId};
use confab_store::DocStore;

use crate::error::ClientError;

/// Result of a handle search, from the searching user's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A new chat can be started with this account.
    Found(User),
    /// The handle is the searcher's own.
    SelfMatch,
    /// A conversation with this account already exists; no duplicate
    /// creation is offered.
    AlreadyChatting(ConversationId),
    /// No account under this handle.
    NotFound,
}

pub struct Directory {
    store: Arc<DocStore>,
}

impl Directory {
    pub fn new(store: Arc<DocStore>) -> Self {
        Self { store }
    }

    /// Register an account: its profile document plus an empty chat list.
    /// Normally driven by the sign-up flow outside this core.
    pub fn register(&self, user: &User) -> Result<(), ClientError> {
        self.store
            .set_from(USERS_COLLECTION, user.id.as_str(), user)?;
        self.store
            .set_from(CHATS_COLLECTION, user.id.as_str(), &ChatList::default())?;
        info!(user = %user.id, handle = %user.username, "user registered");
        Ok(())
    }

    /// Look up an account by handle on behalf of `searcher`.
    pub fn lookup(&self, handle: &str, searcher: &UserId) -> Result<LookupOutcome, ClientError> {
        let handle = handle.trim().to_lowercase();
        if handle.is_empty() {
            return Ok(LookupOutcome::NotFound);
        }

        let mut hits = self
            .store
            .find_eq(USERS_COLLECTION, "username", &json!(handle));
        let Some(value) = hits.pop() else {
            return Ok(LookupOutcome::NotFound);
        };
        let found: User = serde_json::from_value(value).map_err(confab_store::StoreError::from)?;

        if &found.id == searcher {
            return Ok(LookupOutcome::SelfMatch);
        }

        let chat_list: Option<ChatList> = self.store.get_as(CHATS_COLLECTION, searcher.as_str())?;
        if let Some(list) = chat_list {
            if let Some(entry) = list.chats.iter().find(|c| c.counterpart_id == found.id) {
                return Ok(LookupOutcome::AlreadyChatting(entry.conversation_id));
            }
        }

        Ok(LookupOutcome::Found(found))
    }

    /// Create an empty conversation between `me` and `other`, then write
    /// one chat-list entry into each participant's document, each carrying
    /// the *other* party's display data.
    ///
    /// The two entry writes are sequential and non-transactional: a
    /// failure after the first leaves a one-sided conversation, the same
    /// dual-write hazard as the send path.
    pub fn create_conversation(
        &self,
        me: &User,
        other: &User,
    ) -> Result<ConversationId, ClientError> {
        let conversation_id = ConversationId::new();
        let now = Utc::now();

        self.store.set_from(
            MESSAGES_COLLECTION,
            &conversation_id.to_string(),
            &ConversationDoc::new(now),
        )?;

        // Counterpart first, then self, matching the order previews are
        // written on send.
        for (owner, counterpart) in [(other, me), (me, other)] {
            let entry = ChatListEntry {
                conversation_id,
                counterpart_id: counterpart.id.clone(),
                counterpart: counterpart.profile(),
                last_message: String::new(),
                updated_at: now,
                message_seen: false,
            };
            let value = serde_json::to_value(&entry).map_err(confab_store::StoreError::from)?;
            if let Err(e) = self
                .store
                .array_union(CHATS_COLLECTION, owner.id.as_str(), "chats", vec![value])
            {
                warn!(owner = %owner.id, error = %e, "chat list entry write failed");
                return Err(e.into());
            }
        }

        info!(conversation = %conversation_id, a = %me.id, b = %other.id, "conversation created");
        Ok(conversation_id)
    }

    /// Read a user's whole chat list (empty if unregistered).
    pub fn chat_list(&self, user: &UserId) -> Result<ChatList, ClientError> {
        Ok(self
            .store
            .get_as(CHATS_COLLECTION, user.as_str())?
            .unwrap_or_default())
    }
}
