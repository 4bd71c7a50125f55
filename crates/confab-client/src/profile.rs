//! Profile updates and the presence heartbeat.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};
use tracing::info;

use confab_shared::constants::{MAX_IMAGE_BYTES, USERS_COLLECTION};
use confab_shared::models::User;
use confab_shared::types::UserId;
use confab_store::{BlobStore, DocStore, StoreError};

use crate::error::ClientError;

pub struct Profiles {
    store: Arc<DocStore>,
    blobs: Arc<BlobStore>,
}

impl Profiles {
    pub fn new(store: Arc<DocStore>, blobs: Arc<BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Update display name and bio, optionally replacing the avatar.
    ///
    /// The avatar is uploaded first (same 2 MiB ceiling as chat images);
    /// only the touched fields are written, and the refreshed profile is
    /// returned for the caller to publish into its session.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        name: &str,
        bio: &str,
        avatar: Option<&[u8]>,
    ) -> Result<User, ClientError> {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("bio".to_string(), json!(bio));

        if let Some(bytes) = avatar {
            if bytes.len() > MAX_IMAGE_BYTES {
                return Err(ClientError::AvatarTooLarge { size: bytes.len() });
            }
            let url = self.blobs.put(bytes).await?;
            fields.insert("avatar".to_string(), json!(url));
        }

        self.store
            .update(USERS_COLLECTION, user_id.as_str(), fields)
            .map_err(|e| match e {
                StoreError::NotFound => ClientError::UserNotFound,
                other => ClientError::Store(other),
            })?;

        let user: User = self
            .store
            .get_as(USERS_COLLECTION, user_id.as_str())?
            .ok_or(ClientError::UserNotFound)?;

        info!(user = %user_id, "profile updated");
        Ok(user)
    }

    /// Presence heartbeat: stamp `last_seen` with the current time.
    pub fn touch_last_seen(&self, user_id: &UserId) -> Result<(), ClientError> {
        let mut fields = Map::new();
        fields.insert("lastSeen".to_string(), json!(Utc::now()));
        self.store
            .update(USERS_COLLECTION, user_id.as_str(), fields)
            .map_err(|e| match e {
                StoreError::NotFound => ClientError::UserNotFound,
                other => ClientError::Store(other),
            })
    }

    /// Fetch a user's current profile document.
    pub fn fetch(&self, user_id: &UserId) -> Result<User, ClientError> {
        self.store
            .get_as(USERS_COLLECTION, user_id.as_str())?
            .ok_or(ClientError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn setup() -> (Profiles, Arc<DocStore>, User, TempDir) {
        let store = Arc::new(DocStore::new());
        let dir = TempDir::new().unwrap();
        let blobs = Arc::new(
            BlobStore::new(dir.path().to_path_buf(), MAX_IMAGE_BYTES)
                .await
                .unwrap(),
        );
        let user = User {
            id: UserId::from("u1"),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            avatar: "blob:///old-avatar".to_string(),
            bio: "old bio".to_string(),
            last_seen: Utc::now() - Duration::hours(1),
        };
        store.set_from(USERS_COLLECTION, "u1", &user).unwrap();
        (Profiles::new(store.clone(), blobs), store, user, dir)
    }

    #[tokio::test]
    async fn update_without_avatar_keeps_old_one() {
        let (profiles, _store, user, _dir) = setup().await;

        let updated = profiles
            .update_profile(&user.id, "Alice B.", "new bio", None)
            .await
            .unwrap();

        assert_eq!(updated.name, "Alice B.");
        assert_eq!(updated.bio, "new bio");
        assert_eq!(updated.avatar, "blob:///old-avatar");
    }

    #[tokio::test]
    async fn update_with_avatar_uploads_and_rewrites_url() {
        let (profiles, _store, user, _dir) = setup().await;

        let updated = profiles
            .update_profile(&user.id, "Alice", "bio", Some(&[9, 9, 9]))
            .await
            .unwrap();

        assert_ne!(updated.avatar, "blob:///old-avatar");
        assert!(updated.avatar.starts_with("blob:///"));
    }

    #[tokio::test]
    async fn oversized_avatar_rejected_locally() {
        let (profiles, _store, user, dir) = setup().await;
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];

        let err = profiles
            .update_profile(&user.id, "Alice", "bio", Some(&big))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AvatarTooLarge { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let (profiles, ..) = setup().await;
        let err = profiles
            .update_profile(&UserId::from("ghost"), "x", "y", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UserNotFound));
    }

    #[tokio::test]
    async fn heartbeat_refreshes_last_seen() {
        let (profiles, _store, user, _dir) = setup().await;
        assert!(!profiles.fetch(&user.id).unwrap().is_online(Utc::now()));

        profiles.touch_last_seen(&user.id).unwrap();
        assert!(profiles.fetch(&user.id).unwrap().is_online(Utc::now()));
    }
}
