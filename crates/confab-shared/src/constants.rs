/// Maximum image payload size in bytes (2 MiB)
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Chat-list preview length in characters
pub const PREVIEW_MAX_CHARS: usize = 30;

/// Preview string stored in a chat-list entry for image messages
pub const IMAGE_PREVIEW: &str = "image";

/// Sentinel image URL for a message whose upload is still in flight
pub const UPLOADING_SENTINEL: &str = "uploading";

/// Presence window: a user is shown online if their last heartbeat is
/// at most this many seconds old
pub const ONLINE_WINDOW_SECS: i64 = 70;

/// Document collection holding one profile document per registered user
pub const USERS_COLLECTION: &str = "users";

/// Document collection holding one chat-list document per user
pub const CHATS_COLLECTION: &str = "chats";

/// Document collection holding one message log per conversation
pub const MESSAGES_COLLECTION: &str = "messages";
