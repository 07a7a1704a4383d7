//! Outbound port to the chat transport.
//!
//! The controller emits replies, edits progress messages and fetches media
//! through this trait; the Telegram implementation lives in
//! [`crate::telegram`], the test suites use a recording fake.

use async_trait::async_trait;
use std::path::Path;

/// Handle to a previously sent message, used for edits
pub type MessageRef = i32;

/// Operations the dialogue core needs from the chat transport
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Send an HTML-formatted message to the user.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport gives up after its own retries.
    async fn send(&self, user_id: i64, html: &str) -> anyhow::Result<MessageRef>;

    /// Edit a previously sent message, best-effort.
    ///
    /// Returns false when the edit was skipped or failed; callers must not
    /// treat a failed edit as fatal (progress updates are unreliable by
    /// contract).
    async fn edit(&self, user_id: i64, message: MessageRef, html: &str) -> bool;

    /// Download a transport-held file to a local path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be fetched or written.
    async fn download(&self, file_id: &str, dest: &Path) -> anyhow::Result<()>;
}
