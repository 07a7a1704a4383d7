//! Chunked resumable upload engine for the YouTube Data API v3.
//!
//! The protocol has two phases: an initiation POST carrying the video
//! metadata, whose response `Location` header is a session URI, followed by
//! sequential `Content-Range`-tagged PUTs of the file body. The server
//! answers 308 while the transfer is incomplete and 200/201 with the video
//! resource once the last chunk lands.
//!
//! Transient (5xx / connection-level) chunk errors are retried at the same
//! chunk boundary with exponential backoff; 4xx-class errors abort
//! immediately. The wire calls live behind [`UploadTransport`] so the retry
//! behavior is testable without a network.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{info, warn};

use crate::config::{
    DEFAULT_CATEGORY_ID, FORCED_PRIVACY_STATUS, UPLOAD_CHUNK_SIZE, UPLOAD_ENDPOINT,
    UPLOAD_MAX_RETRIES,
};

/// Errors produced by the upload engine
#[derive(Error, Debug)]
pub enum UploadError {
    /// Server-side (5xx) failure; the same chunk boundary may be retried
    #[error("retriable HTTP {status} during upload: {message}")]
    Retriable {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },
    /// Client-side (4xx, quota, permission) failure; never retried
    #[error("upload rejected with HTTP {status}: {message}")]
    Fatal {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },
    /// Connection-level failure reaching the upload endpoint
    #[error("network error during upload: {0}")]
    Network(String),
    /// The initiation response carried no usable session URI
    #[error("upload session rejected: {0}")]
    Session(String),
    /// Local file error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    /// The cumulative retry budget was exhausted
    #[error("upload abandoned after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total tries performed
        attempts: u32,
        /// The last transient error observed
        last: String,
    },
}

impl UploadError {
    /// Whether the engine may retry after this error
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable { .. } | Self::Network(_))
    }
}

/// Fixed metadata submitted with the video
#[derive(Debug, Clone)]
pub struct VideoMeta {
    /// Video title
    pub title: String,
    /// Video description
    pub description: String,
    /// Tag list (currently always empty)
    pub tags: Vec<String>,
    /// YouTube category ID
    pub category_id: String,
    /// Privacy status; forced to "private" by the engine
    pub privacy_status: String,
}

impl VideoMeta {
    /// JSON body for the initiation request
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
        })
    }
}

/// One upload attempt over a local file
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Path of the downloaded video file
    pub local_path: PathBuf,
    /// Video title
    pub title: String,
    /// Video description (signature already appended)
    pub description: String,
    /// Caller-suggested privacy status; overridden by policy
    pub privacy_status: String,
}

/// Result of transmitting one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Server stored bytes up to (but not including) `received`
    Incomplete {
        /// Number of bytes the server has confirmed
        received: u64,
    },
    /// Transfer complete
    Complete {
        /// Platform-assigned video identifier
        video_id: String,
    },
}

/// Wire operations of the resumable upload protocol
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Initiate an upload session; returns the session URI.
    async fn begin_session(
        &self,
        access_token: &str,
        meta: &VideoMeta,
        total_bytes: u64,
    ) -> Result<String, UploadError>;

    /// Transmit one chunk starting at `offset` of `total_bytes`.
    async fn send_chunk(
        &self,
        session_uri: &str,
        access_token: &str,
        offset: u64,
        total_bytes: u64,
        chunk: Bytes,
    ) -> Result<ChunkOutcome, UploadError>;
}

/// Real transport speaking to the YouTube upload endpoint over `reqwest`
pub struct ResumableTransport {
    http: reqwest::Client,
}

impl ResumableTransport {
    /// Create a transport with a fresh HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ResumableTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_status(status: reqwest::StatusCode, message: String) -> UploadError {
    if status.is_server_error() {
        UploadError::Retriable {
            status: status.as_u16(),
            message,
        }
    } else {
        UploadError::Fatal {
            status: status.as_u16(),
            message,
        }
    }
}

/// Parse a 308 `Range` header of the form `bytes=0-12345`.
fn parse_range_end(range: &str) -> Option<u64> {
    range
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .parse()
        .ok()
}

#[async_trait]
impl UploadTransport for ResumableTransport {
    async fn begin_session(
        &self,
        access_token: &str,
        meta: &VideoMeta,
        total_bytes: u64,
    ) -> Result<String, UploadError> {
        let response = self
            .http
            .post(UPLOAD_ENDPOINT)
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", total_bytes)
            .json(&meta.to_json())
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| UploadError::Session("no Location header in response".into()))
    }

    async fn send_chunk(
        &self,
        session_uri: &str,
        access_token: &str,
        offset: u64,
        total_bytes: u64,
        chunk: Bytes,
    ) -> Result<ChunkOutcome, UploadError> {
        if chunk.is_empty() {
            // An empty chunk has no representable Content-Range
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "refusing to send an empty chunk",
            )));
        }
        let end = offset + chunk.len() as u64 - 1;
        let content_range = format!("bytes {offset}-{end}/{total_bytes}");

        let response = self
            .http
            .put(session_uri)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_RANGE, content_range)
            .header(reqwest::header::CONTENT_LENGTH, chunk.len())
            .body(chunk)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();

        // 308 Resume Incomplete: the Range header reports stored bytes
        if status.as_u16() == 308 {
            let received = response
                .headers()
                .get(reqwest::header::RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_end)
                .map_or(end + 1, |last| last + 1);
            return Ok(ChunkOutcome::Incomplete { received });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;
        let video_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| UploadError::Session("completed upload carried no video id".into()))?
            .to_string();
        Ok(ChunkOutcome::Complete { video_id })
    }
}

/// Drives a chunked resumable upload with bounded retries
#[derive(Clone)]
pub struct UploadEngine {
    transport: Arc<dyn UploadTransport>,
    chunk_size: u64,
    max_retries: u32,
}

impl UploadEngine {
    /// Create an engine over the given transport with default tuning
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            chunk_size: UPLOAD_CHUNK_SIZE,
            max_retries: UPLOAD_MAX_RETRIES,
        }
    }

    /// Override the chunk size (tests use small chunks)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Upload the file and return the platform-assigned video ID.
    ///
    /// The privacy status is forced to "private" regardless of the caller's
    /// suggestion; category and made-for-kids are fixed by policy.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::RetriesExhausted`] once transient errors
    /// exceed the cumulative retry cap, or the first fatal error otherwise.
    pub async fn upload(
        &self,
        access_token: &str,
        request: &UploadRequest,
    ) -> Result<String, UploadError> {
        if request.privacy_status != FORCED_PRIVACY_STATUS {
            warn!(
                "Requested privacy status '{}' overridden to '{}'",
                request.privacy_status, FORCED_PRIVACY_STATUS
            );
        }
        let meta = VideoMeta {
            title: request.title.clone(),
            description: request.description.clone(),
            tags: Vec::new(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            privacy_status: FORCED_PRIVACY_STATUS.to_string(),
        };

        let mut file = tokio::fs::File::open(&request.local_path).await?;
        let total_bytes = file.metadata().await?.len();
        if total_bytes == 0 {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file is empty",
            )));
        }

        let session_uri = self
            .transport
            .begin_session(access_token, &meta, total_bytes)
            .await?;
        info!(
            "Upload session opened for '{}' ({} bytes)",
            request.title, total_bytes
        );

        let mut offset: u64 = 0;
        let mut attempt: u32 = 0;

        loop {
            let len = (total_bytes - offset).min(self.chunk_size);
            let mut buf = vec![0u8; usize::try_from(len).unwrap_or(usize::MAX)];
            file.seek(std::io::SeekFrom::Start(offset)).await?;
            file.read_exact(&mut buf).await?;

            let outcome = self
                .transport
                .send_chunk(
                    &session_uri,
                    access_token,
                    offset,
                    total_bytes,
                    Bytes::from(buf),
                )
                .await;

            let transient = match outcome {
                Ok(ChunkOutcome::Complete { video_id }) => {
                    info!("Upload complete, video id {}", video_id);
                    return Ok(video_id);
                }
                // Progress is monotonic: the server never un-stores bytes
                Ok(ChunkOutcome::Incomplete { received }) if received > offset => {
                    offset = received;
                    #[allow(clippy::cast_precision_loss)]
                    let fraction = offset as f64 / total_bytes as f64;
                    info!("Upload progress: {:.0}%", fraction * 100.0);
                    continue;
                }
                // A 308 that confirms no new bytes consumes retry budget
                // like a transient failure
                Ok(ChunkOutcome::Incomplete { received }) => UploadError::Retriable {
                    status: 308,
                    message: format!(
                        "server confirmed {received} bytes, no advance past offset {offset}"
                    ),
                },
                Err(e) if e.is_retriable() => e,
                Err(e) => {
                    warn!("Non-retriable upload error: {}", e);
                    return Err(e);
                }
            };

            attempt += 1;
            if attempt > self.max_retries {
                warn!("Maximum upload retries exceeded: {}", transient);
                return Err(UploadError::RetriesExhausted {
                    attempts: attempt,
                    last: transient.to_string(),
                });
            }
            let delay = Duration::from_secs(2u64.pow(attempt));
            warn!(
                "Transient upload error (attempt {}/{}), retrying in {:?}: {}",
                attempt, self.max_retries, delay, transient
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_end_accepts_google_format() {
        assert_eq!(parse_range_end("bytes=0-12345"), Some(12345));
        assert_eq!(parse_range_end("bytes=0-0"), Some(0));
        assert_eq!(parse_range_end("garbage"), None);
    }

    #[test]
    fn metadata_body_is_fixed_by_policy() {
        let meta = VideoMeta {
            title: "A title".into(),
            description: "desc".into(),
            tags: Vec::new(),
            category_id: DEFAULT_CATEGORY_ID.into(),
            privacy_status: FORCED_PRIVACY_STATUS.into(),
        };
        let body = meta.to_json();
        assert_eq!(body["snippet"]["categoryId"], "22");
        assert_eq!(body["status"]["privacyStatus"], "private");
        assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
    }

    #[tokio::test]
    async fn empty_chunks_are_refused_before_any_wire_io() {
        let transport = ResumableTransport::new();
        let result = transport
            .send_chunk("https://upload.example/session", "token", 0, 0, Bytes::new())
            .await;
        assert!(matches!(result, Err(UploadError::Io(_))), "got: {result:?}");
    }

    #[test]
    fn retriable_classification() {
        let retriable = UploadError::Retriable {
            status: 503,
            message: String::new(),
        };
        let fatal = UploadError::Fatal {
            status: 403,
            message: String::new(),
        };
        assert!(retriable.is_retriable());
        assert!(UploadError::Network("reset".into()).is_retriable());
        assert!(!fatal.is_retriable());
    }
}
