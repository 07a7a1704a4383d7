//! Telegram transport: update routing and the chat-port adapter.
//!
//! Updates are normalized into [`Inbound`] events here; everything past
//! this module is transport-agnostic. For private chats the chat ID and
//! the user ID coincide, so the rest of the bot keys on user ID alone.

pub mod port;

pub use port::TelegramChatPort;

use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::dialogue::{self, DialogueController, Event, Inbound, PendingFile};

/// Bot commands as registered with Telegram
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    /// Welcome message and registration
    #[command(description = "start the bot")]
    Start,
    /// Begin the OAuth flow
    #[command(description = "connect your YouTube account")]
    Auth,
    /// Begin an upload
    #[command(description = "upload a video")]
    Upload,
    /// Recent uploads
    #[command(description = "show your upload history")]
    History,
    /// Usage statistics
    #[command(description = "show statistics")]
    Stats,
    /// Command reference
    #[command(description = "show help")]
    Help,
    /// Abort the current operation
    #[command(description = "cancel the current operation")]
    Cancel,
}

impl Command {
    fn into_action(self) -> dialogue::Command {
        match self {
            Self::Start => dialogue::Command::Start,
            Self::Auth => dialogue::Command::Auth,
            Self::Upload => dialogue::Command::Upload,
            Self::History => dialogue::Command::History,
            Self::Stats => dialogue::Command::Stats,
            Self::Help => dialogue::Command::Help,
            Self::Cancel => dialogue::Command::Cancel,
        }
    }
}

/// Sender's user ID, or 0 when the update carries no sender
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Build the dptree update handler.
///
/// Commands are matched first, then video/document media, then plain text.
/// Authorization happens inside the controller so every path shares one
/// gate.
#[must_use]
pub fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(
        Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(
                dptree::filter(|msg: Message| {
                    msg.video().is_some() || msg.document().is_some()
                })
                .endpoint(handle_media),
            )
            .branch(
                dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
            ),
    )
}

/// Messages without a sender (channel posts) are ignored
fn inbound_from(msg: &Message, event: Event) -> Option<Inbound> {
    let from = msg.from.as_ref()?;
    Some(Inbound {
        user_id: from.id.0.cast_signed(),
        username: from.username.clone(),
        first_name: Some(from.first_name.clone()),
        event,
    })
}

fn pending_file_from(msg: &Message) -> Option<PendingFile> {
    if let Some(video) = msg.video() {
        return Some(PendingFile {
            file_id: video.file.id.0.clone(),
            file_name: video
                .file_name
                .clone()
                .unwrap_or_else(|| "video.mp4".to_string()),
            file_size: u64::from(video.file.size),
            duration_secs: Some(video.duration.seconds()),
            mime_type: video.mime_type.as_ref().map(ToString::to_string),
        });
    }
    if let Some(doc) = msg.document() {
        return Some(PendingFile {
            file_id: doc.file.id.0.clone(),
            file_name: doc
                .file_name
                .clone()
                .unwrap_or_else(|| "video.bin".to_string()),
            file_size: u64::from(doc.file.size),
            duration_secs: None,
            // Documents without a declared type are rejected downstream
            mime_type: Some(
                doc.mime_type
                    .as_ref()
                    .map_or_else(|| "application/octet-stream".to_string(), ToString::to_string),
            ),
        });
    }
    None
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    controller: Arc<DialogueController>,
) -> Result<(), teloxide::RequestError> {
    if let Some(inbound) = inbound_from(&msg, Event::Command(cmd.into_action())) {
        Box::pin(controller.handle(inbound)).await;
    }
    respond(())
}

async fn handle_media(
    msg: Message,
    controller: Arc<DialogueController>,
) -> Result<(), teloxide::RequestError> {
    if let Some(file) = pending_file_from(&msg) {
        if let Some(inbound) = inbound_from(&msg, Event::Media(file)) {
            Box::pin(controller.handle(inbound)).await;
        }
    }
    respond(())
}

async fn handle_text(
    msg: Message,
    controller: Arc<DialogueController>,
) -> Result<(), teloxide::RequestError> {
    if let Some(text) = msg.text() {
        if let Some(inbound) = inbound_from(&msg, Event::Text(text.to_string())) {
            Box::pin(controller.handle(inbound)).await;
        }
    }
    respond(())
}
