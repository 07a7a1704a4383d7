//! Shared fakes for the integration tests: an in-memory chat port, a
//! canned OAuth flow and a scripted upload transport.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use tube_courier::config::Settings;
use tube_courier::dialogue::{
    ChatPort, Command, DialogueController, Event, Inbound, MessageRef, PendingFile,
};
use tube_courier::storage::{MemoryStorage, Storage, StoredCredential};
use tube_courier::youtube::{
    AuthError, ChunkOutcome, OauthFlow, TokenStore, UploadEngine, UploadError, UploadTransport,
    VideoMeta,
};

/// Chat port that records every send and edit
pub struct FakeChat {
    next_id: AtomicI32,
    pub sent: Mutex<Vec<(i64, String)>>,
    pub edits: Mutex<Vec<(i64, MessageRef, String)>>,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI32::new(1),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
        })
    }

    /// All text delivered to a user, sends and edits interleaved in order
    pub async fn all_text(&self, user_id: i64) -> Vec<String> {
        let mut out: Vec<String> = self
            .sent
            .lock()
            .await
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, text)| text.clone())
            .collect();
        out.extend(
            self.edits
                .lock()
                .await
                .iter()
                .filter(|(uid, _, _)| *uid == user_id)
                .map(|(_, _, text)| text.clone()),
        );
        out
    }

    pub async fn last_sent(&self, user_id: i64) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|(uid, _)| *uid == user_id)
            .map(|(_, text)| text.clone())
    }

    pub async fn last_edit(&self, user_id: i64) -> Option<String> {
        self.edits
            .lock()
            .await
            .iter()
            .rev()
            .find(|(uid, _, _)| *uid == user_id)
            .map(|(_, _, text)| text.clone())
    }

    pub async fn sent_count(&self, user_id: i64) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .count()
    }
}

#[async_trait]
impl ChatPort for FakeChat {
    async fn send(&self, user_id: i64, html: &str) -> anyhow::Result<MessageRef> {
        self.sent.lock().await.push((user_id, html.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit(&self, user_id: i64, message: MessageRef, html: &str) -> bool {
        self.edits
            .lock()
            .await
            .push((user_id, message, html.to_string()));
        true
    }

    async fn download(&self, _file_id: &str, dest: &Path) -> anyhow::Result<()> {
        tokio::fs::write(dest, b"0123456789abcdef").await?;
        Ok(())
    }
}

/// Credential that will not need a refresh for an hour
pub fn fresh_credential(access_token: &str) -> StoredCredential {
    StoredCredential {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_endpoint: "https://oauth2.example/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec!["upload".to_string()],
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}

/// Credential whose access token already lapsed
pub fn expired_credential(access_token: &str) -> StoredCredential {
    StoredCredential {
        expires_at: Some(Utc::now() - Duration::hours(1)),
        ..fresh_credential(access_token)
    }
}

/// OAuth flow that mints canned credentials without a network
pub struct FakeFlow {
    pub reject_codes: bool,
    pub refreshes: AtomicU32,
}

impl FakeFlow {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            reject_codes: false,
            refreshes: AtomicU32::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject_codes: true,
            refreshes: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl OauthFlow for FakeFlow {
    fn authorize_url(&self) -> String {
        "https://accounts.example/authorize?client_id=client".to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredCredential, AuthError> {
        if self.reject_codes {
            return Err(AuthError::CodeRejected("HTTP 400: invalid_grant".into()));
        }
        Ok(fresh_credential(&format!("access-{code}")))
    }

    async fn refresh(&self, credential: &StoredCredential) -> Result<StoredCredential, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(fresh_credential(&format!(
            "refreshed-{}",
            credential.access_token
        )))
    }
}

/// Transport that accepts every chunk and completes at the final byte
pub struct FakeTransport {
    pub sessions: AtomicU32,
    pub chunks: AtomicU32,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: AtomicU32::new(0),
            chunks: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    async fn begin_session(
        &self,
        _access_token: &str,
        _meta: &VideoMeta,
        _total_bytes: u64,
    ) -> Result<String, UploadError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok("https://upload.example/session-1".to_string())
    }

    async fn send_chunk(
        &self,
        _session_uri: &str,
        _access_token: &str,
        offset: u64,
        total_bytes: u64,
        chunk: bytes::Bytes,
    ) -> Result<ChunkOutcome, UploadError> {
        self.chunks.fetch_add(1, Ordering::SeqCst);
        let received = offset + chunk.len() as u64;
        if received >= total_bytes {
            Ok(ChunkOutcome::Complete {
                video_id: "vid-123".to_string(),
            })
        } else {
            Ok(ChunkOutcome::Incomplete { received })
        }
    }
}

/// Minimal settings for controller construction; no file or env I/O
pub fn test_settings(allowed_users: Option<&str>) -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        allowed_users_str: allowed_users.map(ToString::to_string),
        google_client_id: "client".to_string(),
        google_client_secret: "secret".to_string(),
        max_file_size: 1024 * 1024,
        r2_access_key_id: None,
        r2_secret_access_key: None,
        r2_endpoint_url: None,
        r2_bucket_name: None,
    }
}

/// Fully wired controller over fakes
pub struct Harness {
    pub controller: DialogueController,
    pub chat: Arc<FakeChat>,
    pub storage: Arc<MemoryStorage>,
    pub flow: Arc<FakeFlow>,
    pub transport: Arc<FakeTransport>,
}

pub fn harness(allowed_users: Option<&str>) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let chat = FakeChat::new();
    let flow = FakeFlow::accepting();
    let transport = FakeTransport::new();

    let tokens = TokenStore::new(storage.clone(), flow.clone());
    let engine = UploadEngine::new(transport.clone()).with_chunk_size(4);
    let controller = DialogueController::new(
        storage.clone(),
        chat.clone(),
        tokens,
        engine,
        &test_settings(allowed_users),
    );

    Harness {
        controller,
        chat,
        storage,
        flow,
        transport,
    }
}

pub fn inbound(user_id: i64, event: Event) -> Inbound {
    Inbound {
        user_id,
        username: Some("tester".to_string()),
        first_name: Some("Test".to_string()),
        event,
    }
}

pub fn cmd(user_id: i64, command: Command) -> Inbound {
    inbound(user_id, Event::Command(command))
}

pub fn text(user_id: i64, s: &str) -> Inbound {
    inbound(user_id, Event::Text(s.to_string()))
}

pub fn media(user_id: i64, file: PendingFile) -> Inbound {
    inbound(user_id, Event::Media(file))
}

pub fn small_video() -> PendingFile {
    PendingFile {
        file_id: "file-1".to_string(),
        file_name: "trip.mp4".to_string(),
        file_size: 16,
        duration_secs: Some(42),
        mime_type: Some("video/mp4".to_string()),
    }
}

/// Walk a user through /auth and the code exchange
pub async fn authenticate(h: &Harness, user_id: i64) {
    h.controller.handle(cmd(user_id, Command::Auth)).await;
    h.controller.handle(text(user_id, "4/0Acode")).await;
    assert!(
        h.storage
            .get_credential(user_id)
            .await
            .expect("storage lookup")
            .is_some(),
        "credential should be stored after the code exchange"
    );
}
