//! The dialogue controller: routes inbound events by command keyword or by
//! the user's current conversation step, enforcing the allow-list gate and
//! all transition guards.
//!
//! Failures are contained per event: a handler error is logged and answered
//! with a generic message, and never touches another user's state.

use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{
    Settings, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN, SUPPORTED_VIDEO_MIME,
    UNAUTHORIZED_CACHE_MAX_SIZE, UNAUTHORIZED_CACHE_TTL_SECS, UNAUTHORIZED_COOLDOWN_SECS,
};
use crate::dialogue::event::{Command, Event, Inbound};
use crate::dialogue::port::ChatPort;
use crate::dialogue::state::{ConversationState, PendingFile, StateTable, Step};
use crate::dialogue::unauthorized::UnauthorizedCache;
use crate::messages;
use crate::storage::Storage;
use crate::youtube::oauth::{AuthError, TokenStore};
use crate::youtube::upload::UploadEngine;

/// The dialogue state machine over injected collaborators
pub struct DialogueController {
    pub(super) storage: Arc<dyn Storage>,
    pub(super) chat: Arc<dyn ChatPort>,
    pub(super) tokens: TokenStore,
    pub(super) engine: UploadEngine,
    pub(super) states: StateTable,
    pub(super) temp_dir: PathBuf,
    denials: UnauthorizedCache,
    allowed_users: HashSet<i64>,
    max_file_size: u64,
}

impl DialogueController {
    /// Build a controller over its collaborators.
    ///
    /// Stores are owned here and live for the process lifetime; nothing is
    /// global.
    pub fn new(
        storage: Arc<dyn Storage>,
        chat: Arc<dyn ChatPort>,
        tokens: TokenStore,
        engine: UploadEngine,
        settings: &Settings,
    ) -> Self {
        Self {
            storage,
            chat,
            tokens,
            engine,
            states: StateTable::new(),
            temp_dir: std::env::temp_dir(),
            denials: UnauthorizedCache::new(
                UNAUTHORIZED_COOLDOWN_SECS,
                UNAUTHORIZED_CACHE_TTL_SECS,
                UNAUTHORIZED_CACHE_MAX_SIZE,
            ),
            allowed_users: settings.allowed_users(),
            max_file_size: settings.max_file_size,
        }
    }

    /// Redirect temp-file downloads (used by tests)
    #[must_use]
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = dir;
        self
    }

    /// The conversation state table (exposed for inspection in tests)
    #[must_use]
    pub fn states(&self) -> &StateTable {
        &self.states
    }

    /// Handle one inbound event end to end.
    ///
    /// The allow-list gate runs before anything else; a rejected event
    /// mutates no state. Handler errors are contained here.
    pub async fn handle(&self, inbound: Inbound) {
        let user_id = inbound.user_id;

        if !self.is_allowed(user_id) {
            self.reject_unauthorized(&inbound).await;
            return;
        }

        if let Err(e) = self.dispatch(inbound).await {
            error!("Handler error for user {}: {:#}", user_id, e);
            if let Err(send_err) = self.chat.send(user_id, &messages::generic_error()).await {
                error!("Failed to send error notice to {}: {}", user_id, send_err);
            }
        }
    }

    fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    async fn reject_unauthorized(&self, inbound: &Inbound) {
        let user_id = inbound.user_id;
        let name = inbound.display_name();

        if self.denials.should_send(user_id, name).await {
            info!("⛔️ Unauthorized access from user {} ({})", user_id, name);
            match self.chat.send(user_id, &messages::access_denied()).await {
                Ok(_) => self.denials.mark_sent(user_id).await,
                Err(e) => error!("Failed to send denial to {}: {}", user_id, e),
            }
        }
    }

    async fn dispatch(&self, inbound: Inbound) -> Result<()> {
        match inbound.event.clone() {
            Event::Command(cmd) => self.dispatch_command(&inbound, cmd).await,
            Event::Text(text) => self.handle_text(&inbound, &text).await,
            Event::Media(file) => self.handle_media(&inbound, file).await,
        }
    }

    async fn dispatch_command(&self, inbound: &Inbound, cmd: Command) -> Result<()> {
        // Every command registers the user and bumps activity
        self.ensure_user(inbound).await?;

        match cmd {
            Command::Start => {
                self.send(inbound.user_id, &messages::welcome(inbound.display_name()))
                    .await
            }
            Command::Auth => self.cmd_auth(inbound).await,
            Command::Upload => self.cmd_upload(inbound).await,
            Command::History => self.cmd_history(inbound).await,
            Command::Stats => self.cmd_stats(inbound).await,
            Command::Help => self.send(inbound.user_id, &messages::help()).await,
            Command::Cancel => self.cmd_cancel(inbound).await,
        }
    }

    /// Make sure the user row exists and bump its activity timestamp
    async fn ensure_user(&self, inbound: &Inbound) -> Result<()> {
        self.storage
            .add_user(
                inbound.user_id,
                inbound.username.clone(),
                inbound.first_name.clone(),
            )
            .await?;
        self.storage.update_activity(inbound.user_id).await?;
        Ok(())
    }

    async fn send(&self, user_id: i64, html: &str) -> Result<()> {
        self.chat.send(user_id, html).await?;
        Ok(())
    }

    async fn cmd_auth(&self, inbound: &Inbound) -> Result<()> {
        let user_id = inbound.user_id;

        // Already-authenticated users skip the auth-code step entirely
        if self.storage.get_credential(user_id).await?.is_some() {
            return self.send(user_id, &messages::already_authenticated()).await;
        }

        let auth_url = self.tokens.authorize_url();
        self.states
            .set(user_id, ConversationState::new(Step::AwaitingAuthCode))
            .await;
        info!("User {} entered the auth-code step", user_id);
        self.send(user_id, &messages::auth_prompt(&auth_url)).await
    }

    async fn cmd_upload(&self, inbound: &Inbound) -> Result<()> {
        let user_id = inbound.user_id;

        if self.step_of(user_id).await == Some(Step::Uploading) {
            return self.send(user_id, &messages::upload_in_progress()).await;
        }
        if self.storage.get_credential(user_id).await?.is_none() {
            return self.send(user_id, &messages::auth_required()).await;
        }

        self.states
            .set(user_id, ConversationState::new(Step::AwaitingVideo))
            .await;
        self.send(user_id, &messages::upload_prompt()).await
    }

    async fn cmd_history(&self, inbound: &Inbound) -> Result<()> {
        let uploads = self.storage.get_user_uploads(inbound.user_id, 10).await?;
        self.send(inbound.user_id, &messages::history(&uploads)).await
    }

    async fn cmd_stats(&self, inbound: &Inbound) -> Result<()> {
        let total_users = self.storage.get_total_users().await?;
        let total_uploads = self.storage.get_total_uploads().await?;
        let user_uploads = self
            .storage
            .get_user_uploads(inbound.user_id, usize::MAX)
            .await?
            .len() as u64;
        self.send(
            inbound.user_id,
            &messages::stats(total_users, total_uploads, user_uploads),
        )
        .await
    }

    /// Cancel clears state unconditionally; an in-flight transfer is not
    /// aborted (cancellation is honored between steps only).
    async fn cmd_cancel(&self, inbound: &Inbound) -> Result<()> {
        let had_state = self.states.clear(inbound.user_id).await;
        if had_state {
            info!("Cancelled operation for user {}", inbound.user_id);
            self.send(inbound.user_id, &messages::cancel_done()).await
        } else {
            self.send(inbound.user_id, &messages::cancel_noop()).await
        }
    }

    async fn step_of(&self, user_id: i64) -> Option<Step> {
        self.states.get(user_id).await.map(|s| s.step)
    }

    async fn handle_text(&self, inbound: &Inbound, text: &str) -> Result<()> {
        let user_id = inbound.user_id;

        let Some(state) = self.states.get(user_id).await else {
            return self.send(user_id, &messages::idle_hint()).await;
        };

        match state.step {
            Step::AwaitingAuthCode => self.text_auth_code(inbound, text).await,
            Step::AwaitingTitle => self.text_title(user_id, text).await,
            Step::AwaitingDescription => self.text_description(inbound, text, state).await,
            Step::Uploading => self.send(user_id, &messages::upload_in_progress()).await,
            Step::AwaitingVideo => self.send(user_id, &messages::unknown_input()).await,
        }
    }

    /// Auth-code step: the state returns to NONE whether the exchange
    /// succeeds or fails; on failure the user restarts with /auth.
    async fn text_auth_code(&self, inbound: &Inbound, code: &str) -> Result<()> {
        let user_id = inbound.user_id;

        match self.tokens.exchange_code_for_token(user_id, code).await {
            Ok(_) => {
                self.states.clear(user_id).await;
                info!("Auth successful for user {}", user_id);
                self.send(user_id, &messages::auth_success(inbound.display_name()))
                    .await
            }
            Err(AuthError::Storage(e)) => Err(e.into()),
            Err(e) => {
                // Invalid-code and transport failures stay distinct in the
                // logs but share one user-visible reply.
                warn!("Auth failed for user {}: {}", user_id, e);
                self.states.clear(user_id).await;
                self.send(user_id, &messages::auth_invalid_code()).await
            }
        }
    }

    async fn text_title(&self, user_id: i64, text: &str) -> Result<()> {
        let title = text.trim();

        if title.chars().count() > MAX_TITLE_LEN {
            warn!(
                "Title too long for user {}: {} chars",
                user_id,
                title.chars().count()
            );
            // No state change; the user may retry immediately
            return self.send(user_id, &messages::title_too_long()).await;
        }

        let title = title.to_string();
        self.states
            .mutate(user_id, |s| {
                s.title = Some(title.clone());
                s.step = Step::AwaitingDescription;
            })
            .await;
        self.send(user_id, &messages::title_set(&title)).await
    }

    async fn text_description(
        &self,
        inbound: &Inbound,
        text: &str,
        state: ConversationState,
    ) -> Result<()> {
        let user_id = inbound.user_id;
        let text = text.trim();

        // "skip" (any casing) means an empty description
        let description = if text.to_lowercase() == "skip" {
            String::new()
        } else {
            text.to_string()
        };

        if description.chars().count() > MAX_DESCRIPTION_LEN {
            // Enforced here rather than letting the platform reject after
            // a full transfer
            return self.send(user_id, &messages::description_too_long()).await;
        }

        let Some(file) = state.pending_file else {
            self.states.clear(user_id).await;
            anyhow::bail!("description step reached without a pending file");
        };
        let title = state.title.unwrap_or_else(|| "Untitled Video".to_string());

        let collected = description.clone();
        self.states
            .mutate(user_id, |s| {
                s.description = Some(collected);
                s.step = Step::Uploading;
            })
            .await;

        // State clears regardless of the upload outcome
        let result = self.run_upload(inbound, file, title, description).await;
        self.states.clear(user_id).await;
        result
    }

    async fn handle_media(&self, inbound: &Inbound, file: PendingFile) -> Result<()> {
        let user_id = inbound.user_id;
        self.ensure_user(inbound).await?;

        // Exactly one upload job per user at a time
        if self.step_of(user_id).await == Some(Step::Uploading) {
            return self.send(user_id, &messages::upload_in_progress()).await;
        }

        if self.storage.get_credential(user_id).await?.is_none() {
            return self.send(user_id, &messages::auth_required()).await;
        }

        if file.file_size == 0 {
            return self.send(user_id, &messages::empty_file()).await;
        }

        if file.file_size > self.max_file_size {
            return self
                .send(
                    user_id,
                    &messages::file_too_large(file.file_size, self.max_file_size),
                )
                .await;
        }

        if let Some(mime) = file.mime_type.as_deref() {
            if !SUPPORTED_VIDEO_MIME.contains(&mime) {
                return self.send(user_id, &messages::unsupported_format()).await;
            }
        }

        // Unsolicited videos are accepted from any step (except an active
        // upload) and re-enter title collection, replacing prior state.
        let mut state = ConversationState::new(Step::AwaitingTitle);
        state.pending_file = Some(file.clone());
        self.states.set(user_id, state).await;

        self.send(
            user_id,
            &messages::video_details_prompt(&file.file_name, file.file_size),
        )
        .await
    }
}
