//! Conversation sync engine.
//!
//! Owns the full send path and the live view of one conversation:
//!
//! - sends pass the moderation gate, append to the shared message log via
//!   an atomic array-union, then bump **both** participants' chat-list
//!   entries (preview, timestamp, seen flag);
//! - image sends publish an optimistic local placeholder before the
//!   upload and resolve it to `Committed` or `Failed`;
//! - [`ConversationFeed`] delivers full message-list snapshots, newest
//!   first, for every server-side change.
//!
//! The two chat-list bumps are sequential, not transactional: a failure
//! between them leaves one participant's preview stale until the next
//! send.  Each individual bump is an atomic per-document mutation, so a
//! concurrent writer can no longer clobber it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use confab_moderation::Moderator;
use confab_shared::constants::{
    CHATS_COLLECTION, MAX_IMAGE_BYTES, MESSAGES_COLLECTION, UPLOADING_SENTINEL,
};
use confab_shared::models::{ChatList, ChatListEntry, ConversationDoc, Message, MessageBody};
use confab_shared::types::{ConversationId, UserId};
use confab_store::{BlobStore, DocStore, StoreError};

use crate::error::{ClientError, SendError};
use crate::state::{AppState, OpenConversation, UploadState};

/// Whether a send actually went out.  Empty input is a quiet no-op, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped,
}

/// The client-side engine keeping both participants' chat-list documents
/// consistent with the shared conversation log.
pub struct ChatEngine {
    store: Arc<DocStore>,
    blobs: Arc<BlobStore>,
    moderator: Arc<dyn Moderator>,
    state: Arc<Mutex<AppState>>,
}

impl ChatEngine {
    pub fn new(
        store: Arc<DocStore>,
        blobs: Arc<BlobStore>,
        moderator: Arc<dyn Moderator>,
        state: Arc<Mutex<AppState>>,
    ) -> Self {
        Self {
            store,
            blobs,
            moderator,
            state,
        }
    }

    pub fn state(&self) -> &Arc<Mutex<AppState>> {
        &self.state
    }

    /// Display a conversation: mark it seen for the current user, publish
    /// it as the open conversation (replacing any previous one, so at most
    /// one feed is live per displayed conversation) and return its feed.
    pub fn open_conversation(&self, entry: &ChatListEntry) -> Result<ConversationFeed, ClientError> {
        let viewer = {
            let state = self.state.lock();
            state
                .current_user()
                .ok_or(ClientError::NoSession)?
                .id
                .clone()
        };

        self.mark_seen(entry.conversation_id, &viewer)?;

        let mut state = self.state.lock();
        state.open_conversation = Some(OpenConversation::from_entry(entry));
        drop(state);

        Ok(self.subscribe(entry.conversation_id))
    }

    /// Tear down the conversation view.  Dropping the feed handle detaches
    /// the listener; in-flight sends are not aborted.
    pub fn close_conversation(&self) {
        self.state.lock().open_conversation = None;
    }

    /// Subscribe to a conversation's message log.  Each server-side change
    /// yields the complete list, newest first.
    pub fn subscribe(&self, conversation_id: ConversationId) -> ConversationFeed {
        let rx = self
            .store
            .watch(MESSAGES_COLLECTION, &conversation_id.to_string());
        ConversationFeed {
            conversation_id,
            rx,
            state: self.state.clone(),
        }
    }

    /// Send a text message.
    ///
    /// Empty text is a quiet no-op.  Text the moderation service labels
    /// hateful or offensive is a hard abort: nothing is persisted and the
    /// label is surfaced to the caller.
    pub async fn send_text(
        &self,
        conversation_id: ConversationId,
        sender: &UserId,
        recipient: &UserId,
        text: &str,
    ) -> Result<SendOutcome, SendError> {
        if text.is_empty() {
            return Ok(SendOutcome::Skipped);
        }

        let verdict = self.moderator.classify(text).await?;
        if verdict.is_blocked() {
            warn!(conversation = %conversation_id, label = verdict.label(), "message blocked");
            return Err(SendError::Blocked(verdict.label().to_string()));
        }

        let message = Message {
            sender: sender.clone(),
            body: MessageBody::text(text),
            created_at: Utc::now(),
        };

        self.append_message(conversation_id, &message)?;
        self.bump_chat_entries(
            conversation_id,
            sender,
            recipient,
            &message.body.preview(),
            message.created_at,
        );

        info!(conversation = %conversation_id, sender = %sender, "text message sent");
        Ok(SendOutcome::Sent)
    }

    /// Send an image message.
    ///
    /// Payloads over 2 MiB are rejected before any remote call.  A local
    /// placeholder is published immediately; if the upload fails the
    /// placeholder is removed and the upload marked `Failed` so the UI can
    /// offer a retry, never left dangling.
    pub async fn send_image(
        &self,
        conversation_id: ConversationId,
        sender: &UserId,
        recipient: &UserId,
        bytes: &[u8],
    ) -> Result<SendOutcome, SendError> {
        if bytes.is_empty() {
            return Ok(SendOutcome::Skipped);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(SendError::ImageTooLarge { size: bytes.len() });
        }

        self.insert_placeholder(conversation_id, sender);

        let url = match self.blobs.put(bytes).await {
            Ok(url) => url,
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "image upload failed");
                self.fail_placeholder(conversation_id);
                return Err(SendError::Upload(e));
            }
        };

        let message = Message {
            sender: sender.clone(),
            body: MessageBody::image(&url),
            created_at: Utc::now(),
        };

        if let Err(e) = self.append_message(conversation_id, &message) {
            // The blob is already committed; per the error model committed
            // partial writes are not rolled back, but the local placeholder
            // must not dangle.
            self.fail_placeholder(conversation_id);
            return Err(e);
        }

        self.bump_chat_entries(
            conversation_id,
            sender,
            recipient,
            &message.body.preview(),
            message.created_at,
        );
        self.commit_placeholder(conversation_id, &url);

        info!(conversation = %conversation_id, sender = %sender, url = %url, "image message sent");
        Ok(SendOutcome::Sent)
    }

    /// Mark a conversation seen for `viewer`.  Idempotent; a missing
    /// chat-list document or entry is skipped with a warning.
    pub fn mark_seen(
        &self,
        conversation_id: ConversationId,
        viewer: &UserId,
    ) -> Result<(), ClientError> {
        let result = self
            .store
            .mutate(CHATS_COLLECTION, viewer.as_str(), |doc| {
                edit_entry(doc, conversation_id, |entry| entry.message_seen = true);
            });

        match result {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => {
                warn!(user = %viewer, "chat list missing, nothing to mark seen");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // -- internals ----------------------------------------------------------

    fn append_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<(), SendError> {
        let value = serde_json::to_value(message).map_err(StoreError::from)?;
        self.store
            .array_union(
                MESSAGES_COLLECTION,
                &conversation_id.to_string(),
                "messages",
                vec![value],
            )
            .map_err(|e| match e {
                StoreError::NotFound => SendError::NoConversation,
                other => SendError::Store(other),
            })
    }

    /// Update both participants' chat-list entries after an append:
    /// preview, timestamp, and (on the recipient's copy only) the seen
    /// flag.  Best-effort and sequential; a missing document or entry is
    /// skipped with a warning rather than failing the send.
    fn bump_chat_entries(
        &self,
        conversation_id: ConversationId,
        sender: &UserId,
        recipient: &UserId,
        preview: &str,
        at: DateTime<Utc>,
    ) {
        for user in [recipient, sender] {
            let result = self.store.mutate(CHATS_COLLECTION, user.as_str(), |doc| {
                edit_entry(doc, conversation_id, |entry| {
                    entry.last_message = preview.to_string();
                    entry.updated_at = at;
                    // Only the copy whose stored counterpart is the sender
                    // (the recipient's copy) gets its seen flag cleared.
                    if &entry.counterpart_id == sender {
                        entry.message_seen = false;
                    }
                });
            });

            if let Err(e) = result {
                warn!(user = %user, error = %e, "chat list bump skipped");
            }
        }
    }

    fn insert_placeholder(&self, conversation_id: ConversationId, sender: &UserId) {
        let mut state = self.state.lock();
        if let Some(open) = state.open_conversation.as_mut() {
            if open.conversation_id == conversation_id {
                open.messages.insert(
                    0,
                    Message {
                        sender: sender.clone(),
                        body: MessageBody::image(UPLOADING_SENTINEL),
                        created_at: Utc::now(),
                    },
                );
                open.upload = Some(UploadState::Pending);
                debug!(conversation = %conversation_id, "placeholder published");
            }
        }
    }

    fn commit_placeholder(&self, conversation_id: ConversationId, url: &str) {
        let mut state = self.state.lock();
        if let Some(open) = state.open_conversation.as_mut() {
            if open.conversation_id == conversation_id {
                for msg in &mut open.messages {
                    if is_uploading_placeholder(msg) {
                        msg.body = MessageBody::image(url);
                    }
                }
                open.upload = Some(UploadState::Committed(url.to_string()));
            }
        }
    }

    fn fail_placeholder(&self, conversation_id: ConversationId) {
        let mut state = self.state.lock();
        if let Some(open) = state.open_conversation.as_mut() {
            if open.conversation_id == conversation_id {
                open.messages.retain(|m| !is_uploading_placeholder(m));
                open.upload = Some(UploadState::Failed);
            }
        }
    }
}

fn is_uploading_placeholder(message: &Message) -> bool {
    matches!(&message.body, MessageBody::Image { image } if image == UPLOADING_SENTINEL)
}

/// Deserialize a chat-list document, edit one entry, write it back.
/// Runs inside [`DocStore::mutate`], so the whole edit is atomic per
/// document.
fn edit_entry<F>(doc: &mut Value, conversation_id: ConversationId, f: F)
where
    F: FnOnce(&mut ChatListEntry),
{
    let mut list: ChatList = match serde_json::from_value(doc.clone()) {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "malformed chat list document");
            return;
        }
    };

    match list.entry_mut(conversation_id) {
        Some(entry) => f(entry),
        None => {
            warn!(conversation = %conversation_id, "no chat list entry for conversation");
            return;
        }
    }

    match serde_json::to_value(&list) {
        Ok(value) => *doc = value,
        Err(e) => warn!(error = %e, "failed to serialize chat list"),
    }
}

/// Live subscription to one conversation's message log.
///
/// Snapshots are conflated: a burst of appends may surface as a single
/// change carrying the final list.  Dropping the feed detaches the
/// listener.
pub struct ConversationFeed {
    conversation_id: ConversationId,
    rx: watch::Receiver<Option<Value>>,
    state: Arc<Mutex<AppState>>,
}

impl ConversationFeed {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// The current message list, newest first, without waiting for a
    /// change.  Also published into the shared state.
    pub fn snapshot(&mut self) -> Vec<Message> {
        let value = self.rx.borrow_and_update().clone();
        self.apply(value)
    }

    /// Wait for the next server-side change and return the full message
    /// list, newest first.  Returns `None` only when the store itself has
    /// gone away.
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        self.rx.changed().await.ok()?;
        let value = self.rx.borrow_and_update().clone();
        Some(self.apply(value))
    }

    fn apply(&self, value: Option<Value>) -> Vec<Message> {
        let mut messages = match value {
            Some(value) => match serde_json::from_value::<ConversationDoc>(value) {
                Ok(doc) => doc.messages,
                Err(e) => {
                    warn!(conversation = %self.conversation_id, error = %e,
                        "malformed conversation document");
                    Vec::new()
                }
            },
            // Document not created yet: render an empty conversation
            // rather than faulting on the missing shape.
            None => Vec::new(),
        };
        messages.reverse();

        let mut state = self.state.lock();
        if let Some(open) = state.open_conversation.as_mut() {
            if open.conversation_id == self.conversation_id {
                // Keep the optimistic placeholder at the head while its
                // upload is still in flight.
                if matches!(open.upload, Some(UploadState::Pending)) {
                    if let Some(pending) = open
                        .messages
                        .iter()
                        .find(|m| is_uploading_placeholder(m))
                        .cloned()
                    {
                        messages.insert(0, pending);
                    }
                }
                open.messages = messages.clone();
            }
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use confab_moderation::LexiconModerator;
    use confab_shared::models::User;

    use crate::directory::Directory;

    struct Harness {
        engine: ChatEngine,
        store: Arc<DocStore>,
        state: Arc<Mutex<AppState>>,
        alice: User,
        bob: User,
        conversation: ConversationId,
        _blob_dir: TempDir,
    }

    fn test_user(id: &str, username: &str, name: &str) -> User {
        User {
            id: UserId::from(id),
            username: username.to_string(),
            name: name.to_string(),
            avatar: format!("blob:///{username}-avatar"),
            bio: String::new(),
            last_seen: Utc::now(),
        }
    }

    async fn harness_with_blob_limit(max_blob: usize) -> Harness {
        let store = Arc::new(DocStore::new());
        let blob_dir = TempDir::new().unwrap();
        let blobs = Arc::new(
            BlobStore::new(blob_dir.path().to_path_buf(), max_blob)
                .await
                .unwrap(),
        );
        let state = Arc::new(Mutex::new(AppState::new()));
        let directory = Directory::new(store.clone());

        let alice = test_user("u1", "alice", "Alice");
        let bob = test_user("u2", "bob", "Bob");
        directory.register(&alice).unwrap();
        directory.register(&bob).unwrap();
        let conversation = directory.create_conversation(&alice, &bob).unwrap();

        let engine = ChatEngine::new(
            store.clone(),
            blobs,
            Arc::new(LexiconModerator::default()),
            state.clone(),
        );

        Harness {
            engine,
            store,
            state,
            alice,
            bob,
            conversation,
            _blob_dir: blob_dir,
        }
    }

    async fn harness() -> Harness {
        harness_with_blob_limit(MAX_IMAGE_BYTES).await
    }

    fn chat_list(store: &DocStore, user: &UserId) -> ChatList {
        store
            .get_as(CHATS_COLLECTION, user.as_str())
            .unwrap()
            .unwrap()
    }

    fn conversation_doc(store: &DocStore, id: ConversationId) -> ConversationDoc {
        store
            .get_as(MESSAGES_COLLECTION, &id.to_string())
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn clean_text_lands_and_bumps_both_previews() {
        let h = harness().await;
        // Both sides have previously read the conversation.
        h.engine.mark_seen(h.conversation, &h.alice.id).unwrap();
        h.engine.mark_seen(h.conversation, &h.bob.id).unwrap();

        let outcome = h
            .engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, "hello there")
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent);

        let doc = conversation_doc(&h.store, h.conversation);
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.messages[0].sender, h.alice.id);
        assert_eq!(doc.messages[0].body, MessageBody::text("hello there"));
        let sent_at = doc.messages[0].created_at;

        let alice_entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        let bob_entry = chat_list(&h.store, &h.bob.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();

        assert_eq!(alice_entry.last_message, "hello there");
        assert_eq!(bob_entry.last_message, "hello there");
        assert_eq!(alice_entry.updated_at, sent_at);
        assert_eq!(bob_entry.updated_at, sent_at);

        // Only the recipient's copy (counterpart == sender) flips unseen.
        assert!(alice_entry.message_seen);
        assert!(!bob_entry.message_seen);
    }

    #[tokio::test]
    async fn preview_is_first_30_chars() {
        let h = harness().await;
        let long = "x".repeat(80);
        h.engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, &long)
            .await
            .unwrap();

        let entry = chat_list(&h.store, &h.bob.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        assert_eq!(entry.last_message, "x".repeat(30));
    }

    #[tokio::test]
    async fn blocked_text_mutates_nothing() {
        let h = harness().await;
        let before_alice = chat_list(&h.store, &h.alice.id);
        let before_bob = chat_list(&h.store, &h.bob.id);

        let err = h
            .engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, "I hate you, go away")
            .await
            .unwrap_err();
        match err {
            SendError::Blocked(label) => assert!(label.contains("Hateful")),
            other => panic!("expected Blocked, got {other:?}"),
        }

        assert!(conversation_doc(&h.store, h.conversation).messages.is_empty());
        assert_eq!(chat_list(&h.store, &h.alice.id), before_alice);
        assert_eq!(chat_list(&h.store, &h.bob.id), before_bob);
    }

    #[tokio::test]
    async fn empty_text_is_a_quiet_noop() {
        let h = harness().await;
        let outcome = h
            .engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, "")
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(conversation_doc(&h.store, h.conversation).messages.is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_conversation_fails() {
        let h = harness().await;
        let err = h
            .engine
            .send_text(ConversationId::new(), &h.alice.id, &h.bob.id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::NoConversation));
    }

    #[tokio::test]
    async fn oversized_image_makes_no_remote_call() {
        let h = harness().await;
        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];

        let err = h
            .engine
            .send_image(h.conversation, &h.alice.id, &h.bob.id, &oversized)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::ImageTooLarge { .. }));

        // Nothing reached the blob store, nothing was persisted.
        let blob_count = std::fs::read_dir(h._blob_dir.path()).unwrap().count();
        assert_eq!(blob_count, 0);
        assert!(conversation_doc(&h.store, h.conversation).messages.is_empty());
    }

    #[tokio::test]
    async fn image_send_uploads_appends_and_commits_placeholder() {
        let h = harness().await;
        {
            let mut state = h.state.lock();
            state.sign_in(h.alice.clone());
        }
        let alice_entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        let _feed = h.engine.open_conversation(&alice_entry).unwrap();

        h.engine
            .send_image(h.conversation, &h.alice.id, &h.bob.id, &[1, 2, 3, 4])
            .await
            .unwrap();

        let doc = conversation_doc(&h.store, h.conversation);
        assert_eq!(doc.messages.len(), 1);
        let url = match &doc.messages[0].body {
            MessageBody::Image { image } => image.clone(),
            other => panic!("expected image body, got {other:?}"),
        };
        assert!(url.starts_with("blob:///"));

        let bob_entry = chat_list(&h.store, &h.bob.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        assert_eq!(bob_entry.last_message, "image");
        assert!(!bob_entry.message_seen);

        let state = h.state.lock();
        let open = state.open_conversation.as_ref().unwrap();
        assert_eq!(open.upload, Some(UploadState::Committed(url.clone())));
        assert_eq!(open.messages[0].body, MessageBody::image(url));
    }

    #[tokio::test]
    async fn failed_upload_removes_placeholder() {
        // Blob store ceiling below the payload size forces the upload to
        // fail after the placeholder is already published.
        let h = harness_with_blob_limit(4).await;
        {
            let mut state = h.state.lock();
            state.sign_in(h.alice.clone());
        }
        let alice_entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        let _feed = h.engine.open_conversation(&alice_entry).unwrap();

        let err = h
            .engine
            .send_image(h.conversation, &h.alice.id, &h.bob.id, &[0u8; 16])
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Upload(_)));

        let state = h.state.lock();
        let open = state.open_conversation.as_ref().unwrap();
        assert_eq!(open.upload, Some(UploadState::Failed));
        assert!(open.messages.iter().all(|m| !is_uploading_placeholder(m)));
        drop(state);

        assert!(conversation_doc(&h.store, h.conversation).messages.is_empty());
    }

    #[tokio::test]
    async fn mark_seen_is_idempotent() {
        let h = harness().await;
        h.engine.mark_seen(h.conversation, &h.bob.id).unwrap();
        h.engine.mark_seen(h.conversation, &h.bob.id).unwrap();

        let entry = chat_list(&h.store, &h.bob.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        assert!(entry.message_seen);
    }

    #[tokio::test]
    async fn missing_chat_entry_is_skipped_not_fatal() {
        let h = harness().await;
        // Bob's chat list lost its entry (e.g. created one-sided).
        h.store
            .set_from(CHATS_COLLECTION, h.bob.id.as_str(), &ChatList::default())
            .unwrap();

        h.engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, "still works")
            .await
            .unwrap();

        // The message landed and the sender's copy was still bumped.
        assert_eq!(conversation_doc(&h.store, h.conversation).messages.len(), 1);
        let alice_entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        assert_eq!(alice_entry.last_message, "still works");
        assert!(chat_list(&h.store, &h.bob.id).chats.is_empty());
    }

    #[tokio::test]
    async fn feed_delivers_snapshots_newest_first() {
        let h = harness().await;
        let mut feed = h.engine.subscribe(h.conversation);

        h.engine
            .send_text(h.conversation, &h.alice.id, &h.bob.id, "first")
            .await
            .unwrap();
        let snapshot = feed.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        h.engine
            .send_text(h.conversation, &h.bob.id, &h.alice.id, "second")
            .await
            .unwrap();

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].body, MessageBody::text("second"));
        assert_eq!(snapshot[1].body, MessageBody::text("first"));
    }

    #[tokio::test]
    async fn open_conversation_requires_session_and_marks_seen() {
        let h = harness().await;
        let entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();

        assert!(matches!(
            h.engine.open_conversation(&entry),
            Err(ClientError::NoSession)
        ));

        {
            let mut state = h.state.lock();
            state.sign_in(h.alice.clone());
        }
        let feed = h.engine.open_conversation(&entry).unwrap();
        assert_eq!(feed.conversation_id(), h.conversation);

        let alice_entry = chat_list(&h.store, &h.alice.id)
            .entry(h.conversation)
            .cloned()
            .unwrap();
        assert!(alice_entry.message_seen);

        h.engine.close_conversation();
        assert!(h.state.lock().open_conversation.is_none());
    }
}
