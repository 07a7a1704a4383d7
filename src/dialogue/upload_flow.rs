//! Upload orchestration: token refresh, temp-file download, the transfer
//! task and the progress announcer, and history recording.
//!
//! The transfer and the announcer run as two spawned tasks joined before
//! the outcome is reported; a watch channel tells the announcer the
//! transfer finished so it never paints a stale percentage over the final
//! message.

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{FORCED_PRIVACY_STATUS, PROGRESS_INTERVAL_SECS};
use crate::dialogue::controller::DialogueController;
use crate::dialogue::event::Inbound;
use crate::dialogue::port::{ChatPort, MessageRef};
use crate::dialogue::state::PendingFile;
use crate::messages;
use crate::storage::UploadRecord;
use crate::youtube::upload::UploadRequest;

/// Removes the downloaded media file when the flow exits, on any path
struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed temp file {}", self.path.display()),
                Err(e) => warn!("Failed to remove temp file {}: {}", self.path.display(), e),
            }
        }
    }
}

impl DialogueController {
    /// Run one upload job end to end. The caller owns state cleanup.
    pub(super) async fn run_upload(
        &self,
        inbound: &Inbound,
        file: PendingFile,
        title: String,
        mut description: String,
    ) -> Result<()> {
        let user_id = inbound.user_id;

        let Some(credential) = self.storage.get_credential(user_id).await? else {
            self.chat.send(user_id, &messages::auth_required()).await?;
            return Ok(());
        };

        // Refresh before the transfer starts; a refresh failure aborts the
        // job before any bytes move.
        let credential = match self.tokens.ensure_fresh(user_id, credential).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Token refresh failed for user {}: {}", user_id, e);
                self.chat
                    .send(
                        user_id,
                        &messages::upload_error(
                            "Your authentication has expired. Please run /auth again.",
                        ),
                    )
                    .await?;
                return Ok(());
            }
        };

        let progress = self.chat.send(user_id, &messages::upload_preparing()).await?;

        let temp_path = self
            .temp_dir
            .join(format!("tube-courier-{}-{}", Uuid::new_v4(), file.file_name));
        let _cleanup = TempFileGuard::new(temp_path.clone());

        if let Err(e) = self.chat.download(&file.file_id, &temp_path).await {
            warn!("Media download failed for user {}: {:#}", user_id, e);
            self.chat
                .edit(user_id, progress, &messages::download_failed())
                .await;
            return Ok(());
        }

        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(messages::DESCRIPTION_SIGNATURE);

        self.chat
            .edit(user_id, progress, &messages::upload_progress(10, &file.file_name))
            .await;

        info!(
            "Starting upload for user {}: '{}' ({} bytes)",
            user_id, title, file.file_size
        );

        let request = UploadRequest {
            local_path: temp_path,
            title: title.clone(),
            description: description.clone(),
            privacy_status: FORCED_PRIVACY_STATUS.to_string(),
        };
        let engine = self.engine.clone();
        let access_token = credential.access_token.clone();
        let transfer =
            tokio::spawn(async move { engine.upload(&access_token, &request).await });

        let (done_tx, done_rx) = watch::channel(false);
        let announcer = tokio::spawn(announce_progress(
            Arc::clone(&self.chat),
            user_id,
            progress,
            file.file_name.clone(),
            done_rx,
        ));

        let outcome = transfer.await;
        let _ = done_tx.send(true);
        let _ = announcer.await;

        self.report_outcome(user_id, progress, file, title, description, outcome)
            .await
    }

    async fn report_outcome(
        &self,
        user_id: i64,
        progress: MessageRef,
        file: PendingFile,
        title: String,
        description: String,
        outcome: Result<Result<String, crate::youtube::UploadError>, tokio::task::JoinError>,
    ) -> Result<()> {
        match outcome {
            Ok(Ok(video_id)) => {
                self.chat
                    .edit(
                        user_id,
                        progress,
                        &messages::upload_progress(100, &file.file_name),
                    )
                    .await;

                let record = UploadRecord {
                    url: UploadRecord::watch_url(&video_id),
                    video_id,
                    title,
                    description,
                    file_name: file.file_name,
                    file_size: file.file_size,
                    duration_secs: file.duration_secs,
                    uploaded_at: Utc::now(),
                };
                self.storage.add_upload_record(user_id, &record).await?;
                info!(
                    "Upload complete for user {}: {} -> {}",
                    user_id, record.file_name, record.url
                );
                self.chat
                    .edit(user_id, progress, &messages::upload_success(&record))
                    .await;
            }
            Ok(Err(e)) => {
                warn!("Upload failed for user {}: {}", user_id, e);
                self.chat
                    .edit(user_id, progress, &messages::upload_error(&e.to_string()))
                    .await;
            }
            Err(join_err) => {
                error!("Upload task aborted for user {}: {}", user_id, join_err);
                self.chat
                    .edit(
                        user_id,
                        progress,
                        &messages::upload_error("internal transfer failure"),
                    )
                    .await;
            }
        }

        Ok(())
    }
}

/// Edit the progress message on a fixed cadence while the transfer runs.
///
/// Checkpoints are best effort: a skipped edit never aborts the upload.
/// The loop exits promptly once the done flag flips.
async fn announce_progress(
    chat: Arc<dyn ChatPort>,
    user_id: i64,
    message: MessageRef,
    file_name: String,
    mut done: watch::Receiver<bool>,
) {
    for percent in [20u8, 30, 40, 50, 60, 70, 80, 90] {
        if *done.borrow() {
            break;
        }
        chat.edit(user_id, message, &messages::upload_progress(percent, &file_name))
            .await;
        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(PROGRESS_INTERVAL_SECS)) => {}
            _ = done.changed() => {}
        }
    }
}
