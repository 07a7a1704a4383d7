//! Persistence layer: per-user records, OAuth credentials and upload history.
//!
//! The bot treats persistence as a simple key-value CRUD collaborator. Two
//! implementations exist: [`R2Storage`] keeps JSON documents in an
//! S3-compatible bucket, [`MemoryStorage`] keeps them in process memory
//! (used for local runs without R2 and by the test suites).

/// In-memory storage implementation
pub mod memory;
/// R2/S3-backed storage implementation
pub mod r2;

pub use memory::MemoryStorage;
pub use r2::R2Storage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// S3 get failed
    #[error("S3 get error: {0}")]
    S3Get(String),
    /// S3 put failed
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Document (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Required configuration is missing
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A known bot user
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRecord {
    /// Telegram user ID
    pub user_id: i64,
    /// Telegram username, if set
    pub username: Option<String>,
    /// User's first name
    pub first_name: Option<String>,
    /// When the user first interacted with the bot
    pub joined_date: DateTime<Utc>,
    /// Whether the user completed the OAuth flow
    pub is_authenticated: bool,
    /// Number of completed uploads
    pub upload_count: u64,
    /// Last interaction timestamp
    pub last_activity: DateTime<Utc>,
}

/// OAuth credential material for one user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Current access token
    pub access_token: String,
    /// Refresh token; retained across access-token refreshes unless the
    /// platform issues a new one
    pub refresh_token: Option<String>,
    /// Token endpoint used for refresh round-trips
    pub token_endpoint: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Access-token expiry; `None` is treated as expired
    pub expires_at: Option<DateTime<Utc>>,
}

/// One completed upload
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadRecord {
    /// Platform-assigned video ID
    pub video_id: String,
    /// Video title
    pub title: String,
    /// Video description as submitted
    pub description: String,
    /// Original file name from the chat transport
    pub file_name: String,
    /// File size in bytes
    pub file_size: u64,
    /// Video duration in seconds, when the transport reported one
    pub duration_secs: Option<u32>,
    /// Completion timestamp
    pub uploaded_at: DateTime<Utc>,
    /// Watch URL
    pub url: String,
}

impl UploadRecord {
    /// Watch URL for a YouTube video ID
    #[must_use]
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}

/// Key-value CRUD operations the bot requires from its persistence collaborator.
///
/// Persistence failures fail the current operation; the bot never retries them.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert the user if unknown; no-op for existing users.
    async fn add_user(
        &self,
        user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
    ) -> Result<(), StorageError>;

    /// Bump the user's last-activity timestamp.
    async fn update_activity(&self, user_id: i64) -> Result<(), StorageError>;

    /// Fetch the user's OAuth credential, if any.
    async fn get_credential(&self, user_id: i64) -> Result<Option<StoredCredential>, StorageError>;

    /// Store (or replace) the user's OAuth credential.
    async fn save_credential(
        &self,
        user_id: i64,
        credential: &StoredCredential,
    ) -> Result<(), StorageError>;

    /// Mark the user as authenticated (or not).
    async fn set_authenticated(&self, user_id: i64, authenticated: bool)
        -> Result<(), StorageError>;

    /// Append an upload record and bump the user's upload counter.
    async fn add_upload_record(
        &self,
        user_id: i64,
        record: &UploadRecord,
    ) -> Result<(), StorageError>;

    /// The user's most recent uploads, newest first, at most `limit`.
    async fn get_user_uploads(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, StorageError>;

    /// Total number of uploads across all users.
    async fn get_total_uploads(&self) -> Result<u64, StorageError>;

    /// Total number of known users.
    async fn get_total_users(&self) -> Result<u64, StorageError>;
}
