//! Per-user conversation state and the state table.
//!
//! A user has at most one [`ConversationState`] at a time; absence of a
//! record means no dialogue is in progress. Records are created on the
//! first step-requiring interaction, mutated in place as fields are
//! collected and deleted on completion, cancellation or terminal failure.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Position of a user within the multi-turn dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Waiting for the OAuth authorization code
    AwaitingAuthCode,
    /// Waiting for a video file after /upload
    AwaitingVideo,
    /// Waiting for the video title
    AwaitingTitle,
    /// Waiting for the video description
    AwaitingDescription,
    /// An upload is in flight; re-entry is gated
    Uploading,
}

/// Reference to a video file held by the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Transport file identifier used for download
    pub file_id: String,
    /// Original file name
    pub file_name: String,
    /// File size in bytes
    pub file_size: u64,
    /// Duration in seconds, if the transport reported one
    pub duration_secs: Option<u32>,
    /// MIME type, if the transport reported one
    pub mime_type: Option<String>,
}

/// One user's dialogue state
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Current step
    pub step: Step,
    /// When this record was created (future expiry policy; unenforced)
    pub created_at: DateTime<Utc>,
    /// The video awaiting upload, collected at the media step
    pub pending_file: Option<PendingFile>,
    /// Title collected so far
    pub title: Option<String>,
    /// Description collected so far
    pub description: Option<String>,
}

impl ConversationState {
    /// Fresh state at the given step
    #[must_use]
    pub fn new(step: Step) -> Self {
        Self {
            step,
            created_at: Utc::now(),
            pending_file: None,
            title: None,
            description: None,
        }
    }
}

/// In-memory mapping from user ID to conversation state.
///
/// Access is keyed by user, so different users never contend. Concurrent
/// events from the same user are not serialized; last write wins.
#[derive(Default)]
pub struct StateTable {
    inner: Mutex<HashMap<i64, ConversationState>>,
}

impl StateTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's state, if any
    pub async fn get(&self, user_id: i64) -> Option<ConversationState> {
        self.inner.lock().await.get(&user_id).cloned()
    }

    /// Replace (or create) the user's state
    pub async fn set(&self, user_id: i64, state: ConversationState) {
        self.inner.lock().await.insert(user_id, state);
    }

    /// Mutate the user's state in place; returns false when absent
    pub async fn mutate<F>(&self, user_id: i64, f: F) -> bool
    where
        F: FnOnce(&mut ConversationState),
    {
        match self.inner.lock().await.get_mut(&user_id) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    /// Remove the user's state; returns true when a record existed
    pub async fn clear(&self, user_id: i64) -> bool {
        self.inner.lock().await.remove(&user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_record_means_no_step() {
        let table = StateTable::new();
        assert!(table.get(42).await.is_none());
        assert!(!table.mutate(42, |s| s.title = Some("x".into())).await);
        assert!(!table.clear(42).await);
    }

    #[tokio::test]
    async fn mutate_updates_in_place() {
        let table = StateTable::new();
        table.set(42, ConversationState::new(Step::AwaitingTitle)).await;

        let mutated = table
            .mutate(42, |s| {
                s.title = Some("My Trip".into());
                s.step = Step::AwaitingDescription;
            })
            .await;
        assert!(mutated);

        let state = table.get(42).await.expect("state exists");
        assert_eq!(state.step, Step::AwaitingDescription);
        assert_eq!(state.title.as_deref(), Some("My Trip"));
    }

    #[tokio::test]
    async fn clear_removes_unconditionally() {
        let table = StateTable::new();
        table.set(42, ConversationState::new(Step::Uploading)).await;
        assert!(table.clear(42).await);
        assert!(table.get(42).await.is_none());
    }
}
