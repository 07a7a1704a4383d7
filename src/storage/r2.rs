//! JSON-document storage on an R2 (S3-compatible) bucket.
//!
//! One document per user (`users/{id}.json`), per credential
//! (`credentials/{id}.json`) and per upload history
//! (`uploads/{id}.json`), plus a global counters document. Single-process
//! read-modify-write is safe here because the bot is the only writer.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Storage, StorageError, StoredCredential, UploadRecord, UserRecord};
use crate::config::Settings;

/// Global user/upload counters kept in a single document
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
struct Counters {
    total_users: u64,
    total_uploads: u64,
}

fn user_key(user_id: i64) -> String {
    format!("users/{user_id}.json")
}

fn credential_key(user_id: i64) -> String {
    format!("credentials/{user_id}.json")
}

fn uploads_key(user_id: i64) -> String {
    format!("uploads/{user_id}.json")
}

const COUNTERS_KEY: &str = "stats/counters.json";

/// Storage backed by an R2 bucket holding JSON documents
pub struct R2Storage {
    client: Client,
    bucket: String,
}

impl R2Storage {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if any R2 configuration value is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: bucket.clone(),
        })
    }

    /// Verify the bucket is reachable with a cheap head request.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket cannot be reached.
    pub async fn check_connection(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::S3Get(e.to_string()))?;
        info!("R2 bucket '{}' is reachable.", self.bucket);
        Ok(())
    }

    async fn save_json<T: Serialize + Sync>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(data)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.into_bytes()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::S3Get(e.to_string()))?;
                let json_data = serde_json::from_slice(&data.into_bytes())?;
                Ok(Some(json_data))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(e.to_string())),
        }
    }

    async fn modify_user<F>(&self, user_id: i64, modifier: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let Some(mut user) = self.load_json::<UserRecord>(&user_key(user_id)).await? else {
            // Silently skip unknown users; add_user is always called first
            // by the controller, so this only happens for stale data.
            return Ok(());
        };
        modifier(&mut user);
        self.save_json(&user_key(user_id), &user).await
    }

    async fn modify_counters<F>(&self, modifier: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Counters),
    {
        let mut counters = self
            .load_json::<Counters>(COUNTERS_KEY)
            .await?
            .unwrap_or_default();
        modifier(&mut counters);
        self.save_json(COUNTERS_KEY, &counters).await
    }
}

#[async_trait]
impl Storage for R2Storage {
    async fn add_user(
        &self,
        user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
    ) -> Result<(), StorageError> {
        if self
            .load_json::<UserRecord>(&user_key(user_id))
            .await?
            .is_some()
        {
            return Ok(());
        }

        let now = Utc::now();
        let user = UserRecord {
            user_id,
            username,
            first_name,
            joined_date: now,
            is_authenticated: false,
            upload_count: 0,
            last_activity: now,
        };
        self.save_json(&user_key(user_id), &user).await?;
        self.modify_counters(|c| c.total_users += 1).await?;
        info!("User {} added to storage", user_id);
        Ok(())
    }

    async fn update_activity(&self, user_id: i64) -> Result<(), StorageError> {
        self.modify_user(user_id, |u| u.last_activity = Utc::now())
            .await
    }

    async fn get_credential(&self, user_id: i64) -> Result<Option<StoredCredential>, StorageError> {
        self.load_json(&credential_key(user_id)).await
    }

    async fn save_credential(
        &self,
        user_id: i64,
        credential: &StoredCredential,
    ) -> Result<(), StorageError> {
        self.save_json(&credential_key(user_id), credential).await
    }

    async fn set_authenticated(
        &self,
        user_id: i64,
        authenticated: bool,
    ) -> Result<(), StorageError> {
        self.modify_user(user_id, |u| u.is_authenticated = authenticated)
            .await
    }

    async fn add_upload_record(
        &self,
        user_id: i64,
        record: &UploadRecord,
    ) -> Result<(), StorageError> {
        let mut uploads = self
            .load_json::<Vec<UploadRecord>>(&uploads_key(user_id))
            .await?
            .unwrap_or_default();
        uploads.push(record.clone());
        self.save_json(&uploads_key(user_id), &uploads).await?;

        self.modify_user(user_id, |u| u.upload_count += 1).await?;
        self.modify_counters(|c| c.total_uploads += 1).await?;
        info!("Upload record added for user {}", user_id);
        Ok(())
    }

    async fn get_user_uploads(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError> {
        let uploads = self
            .load_json::<Vec<UploadRecord>>(&uploads_key(user_id))
            .await?
            .unwrap_or_default();
        // Stored oldest-first; callers want newest-first
        Ok(uploads.into_iter().rev().take(limit).collect())
    }

    async fn get_total_uploads(&self) -> Result<u64, StorageError> {
        Ok(self
            .load_json::<Counters>(COUNTERS_KEY)
            .await?
            .unwrap_or_default()
            .total_uploads)
    }

    async fn get_total_users(&self) -> Result<u64, StorageError> {
        Ok(self
            .load_json::<Counters>(COUNTERS_KEY)
            .await?
            .unwrap_or_default()
            .total_users)
    }
}
