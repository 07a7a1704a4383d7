//! Explicit tagged inbound events.
//!
//! The chat transport maps its own message types into these variants; the
//! dialogue core never sees transport-specific objects.

use crate::dialogue::state::PendingFile;

/// A recognized bot command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the welcome message
    Start,
    /// Begin the OAuth flow
    Auth,
    /// Begin the upload dialogue
    Upload,
    /// Show the user's upload history
    History,
    /// Show bot statistics
    Stats,
    /// Show detailed help
    Help,
    /// Cancel the current dialogue
    Cancel,
}

/// One inbound chat event, already classified by the transport
#[derive(Debug, Clone)]
pub enum Event {
    /// A recognized command
    Command(Command),
    /// Free text (never a command)
    Text(String),
    /// A video or video-document attachment
    Media(PendingFile),
}

/// An event paired with its originating user
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Telegram user ID
    pub user_id: i64,
    /// Telegram username, if set
    pub username: Option<String>,
    /// User's first name, for greetings
    pub first_name: Option<String>,
    /// The classified event
    pub event: Event,
}

impl Inbound {
    /// The name used when addressing the user
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or("User")
    }
}
