//! In-memory storage, used when R2 is not configured and by the test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{Storage, StorageError, StoredCredential, UploadRecord, UserRecord};

#[derive(Default)]
struct Inner {
    users: HashMap<i64, UserRecord>,
    credentials: HashMap<i64, StoredCredential>,
    uploads: HashMap<i64, Vec<UploadRecord>>,
}

/// Storage keeping everything in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn add_user(
        &self,
        user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        inner.users.entry(user_id).or_insert_with(|| UserRecord {
            user_id,
            username,
            first_name,
            joined_date: now,
            is_authenticated: false,
            upload_count: 0,
            last_activity: now,
        });
        Ok(())
    }

    async fn update_activity(&self, user_id: i64) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn get_credential(&self, user_id: i64) -> Result<Option<StoredCredential>, StorageError> {
        Ok(self.inner.lock().await.credentials.get(&user_id).cloned())
    }

    async fn save_credential(
        &self,
        user_id: i64,
        credential: &StoredCredential,
    ) -> Result<(), StorageError> {
        self.inner
            .lock()
            .await
            .credentials
            .insert(user_id, credential.clone());
        Ok(())
    }

    async fn set_authenticated(
        &self,
        user_id: i64,
        authenticated: bool,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.is_authenticated = authenticated;
        }
        Ok(())
    }

    async fn add_upload_record(
        &self,
        user_id: i64,
        record: &UploadRecord,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner
            .uploads
            .entry(user_id)
            .or_default()
            .push(record.clone());
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.upload_count += 1;
        }
        Ok(())
    }

    async fn get_user_uploads(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .uploads
            .get(&user_id)
            .map(|v| v.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_total_uploads(&self) -> Result<u64, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.uploads.values().map(|v| v.len() as u64).sum())
    }

    async fn get_total_users(&self) -> Result<u64, StorageError> {
        Ok(self.inner.lock().await.users.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_user_is_idempotent() {
        let storage = MemoryStorage::new();
        storage
            .add_user(1, Some("alice".into()), Some("Alice".into()))
            .await
            .expect("add");
        storage
            .add_user(1, None, None)
            .await
            .expect("second add is a no-op");

        assert_eq!(storage.get_total_users().await.expect("count"), 1);
        // First insert wins
        let inner = storage.inner.lock().await;
        let user = inner.users.get(&1).expect("user exists");
        assert_eq!(user.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn uploads_are_returned_newest_first() {
        let storage = MemoryStorage::new();
        storage.add_user(1, None, None).await.expect("add");
        for i in 0..3 {
            let record = UploadRecord {
                video_id: format!("vid{i}"),
                title: format!("Video {i}"),
                description: String::new(),
                file_name: "clip.mp4".into(),
                file_size: 1024,
                duration_secs: None,
                uploaded_at: Utc::now(),
                url: UploadRecord::watch_url(&format!("vid{i}")),
            };
            storage.add_upload_record(1, &record).await.expect("record");
        }

        let uploads = storage.get_user_uploads(1, 2).await.expect("uploads");
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].video_id, "vid2");
        assert_eq!(uploads[1].video_id, "vid1");
        assert_eq!(storage.get_total_uploads().await.expect("count"), 3);
    }
}
