//! Chat-port adapter over the Telegram Bot API.
//!
//! Sends retry on transient network failures with exponential backoff;
//! edits additionally degrade gracefully on the expected "not modified"
//! and "not found" responses so progress checkpoints never abort a flow.

use async_trait::async_trait;
use std::path::Path;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, ParseMode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::dialogue::{ChatPort, MessageRef};
use crate::utils::{retry_telegram_operation, truncate_str};

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Telegram message length limit, with headroom
const MAX_MESSAGE_CHARS: usize = 4000;

/// [`ChatPort`] implementation backed by a live [`Bot`]
#[derive(Clone)]
pub struct TelegramChatPort {
    bot: Bot,
}

impl TelegramChatPort {
    /// Wrap a bot handle
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn clamp(html: &str) -> String {
        if html.chars().count() > MAX_MESSAGE_CHARS {
            format!("{}...", truncate_str(html, MAX_MESSAGE_CHARS))
        } else {
            html.to_string()
        }
    }
}

#[async_trait]
impl ChatPort for TelegramChatPort {
    async fn send(&self, user_id: i64, html: &str) -> anyhow::Result<MessageRef> {
        let text = Self::clamp(html);
        let msg = retry_telegram_operation(|| async {
            self.bot
                .send_message(ChatId(user_id), text.clone())
                .parse_mode(ParseMode::Html)
                .await
                .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
        })
        .await?;
        Ok(msg.id.0)
    }

    async fn edit(&self, user_id: i64, message: MessageRef, html: &str) -> bool {
        let text = Self::clamp(html);
        let result = retry_telegram_operation(|| async {
            self.bot
                .edit_message_text(ChatId(user_id), teloxide::types::MessageId(message), text.clone())
                .parse_mode(ParseMode::Html)
                .await
                .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
        })
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                    debug!("Message update skipped: {err_msg}");
                } else {
                    warn!("Failed to edit message after retries: {e}");
                }
                false
            }
        }
    }

    async fn download(&self, file_id: &str, dest: &Path) -> anyhow::Result<()> {
        let file = retry_telegram_operation(|| async {
            self.bot
                .get_file(FileId(file_id.to_owned()))
                .await
                .map_err(|e| anyhow::anyhow!("Telegram get_file error: {e}"))
        })
        .await?;

        let mut out = tokio::fs::File::create(dest).await?;
        self.bot.download_file(&file.path, &mut out).await?;
        out.flush().await?;
        Ok(())
    }
}
