//! End-to-end dialogue tests over fake chat, OAuth and upload transports:
//! authorization gating, the auth-code step, title/description collection
//! and the full upload happy path.

mod common;

use common::{authenticate, cmd, harness, media, small_video, text};
use std::sync::atomic::Ordering;
use tube_courier::dialogue::{Command, PendingFile, Step};
use tube_courier::messages::DESCRIPTION_SIGNATURE;
use tube_courier::storage::Storage;

#[tokio::test]
async fn unauthorized_user_is_rejected_without_state_changes() {
    let h = harness(Some("1,2"));

    h.controller.handle(cmd(99, Command::Start)).await;

    let denial = h.chat.last_sent(99).await.expect("denial message");
    assert!(denial.contains("not authorized"), "got: {denial}");
    assert!(h.controller.states().get(99).await.is_none());
    assert_eq!(
        h.storage.get_total_users().await.expect("storage"),
        0,
        "rejected user must not be registered"
    );

    // Within the cooldown window further attempts are silenced
    h.controller.handle(cmd(99, Command::Upload)).await;
    assert_eq!(h.chat.sent_count(99).await, 1);
}

#[tokio::test]
async fn empty_allow_list_means_open_access() {
    let h = harness(None);

    h.controller.handle(cmd(7, Command::Start)).await;

    let reply = h.chat.last_sent(7).await.expect("welcome message");
    assert!(reply.contains("Welcome"), "got: {reply}");
    assert_eq!(h.storage.get_total_users().await.expect("storage"), 1);
}

#[tokio::test]
async fn auth_command_enters_code_step_with_url() {
    let h = harness(None);

    h.controller.handle(cmd(1, Command::Auth)).await;

    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingAuthCode)
    );
    let prompt = h.chat.last_sent(1).await.expect("auth prompt");
    assert!(prompt.contains("accounts.example/authorize"), "got: {prompt}");
}

#[tokio::test]
async fn valid_code_stores_credential_and_clears_state() {
    let h = harness(None);

    authenticate(&h, 1).await;

    assert!(h.controller.states().get(1).await.is_none());
    let reply = h.chat.last_sent(1).await.expect("auth reply");
    assert!(reply.contains("Authentication successful"), "got: {reply}");

    // A second /auth short-circuits
    h.controller.handle(cmd(1, Command::Auth)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("already authenticated"), "got: {reply}");
}

#[tokio::test]
async fn invalid_code_clears_state_for_a_fresh_attempt() {
    let mut h = harness(None);
    h.flow = common::FakeFlow::rejecting();
    let tokens = tube_courier::youtube::TokenStore::new(h.storage.clone(), h.flow.clone());
    h.controller = tube_courier::dialogue::DialogueController::new(
        h.storage.clone(),
        h.chat.clone(),
        tokens,
        tube_courier::youtube::UploadEngine::new(h.transport.clone()),
        &common::test_settings(None),
    );

    h.controller.handle(cmd(1, Command::Auth)).await;
    h.controller.handle(text(1, "bad-code")).await;

    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("Invalid authorization code"), "got: {reply}");
    assert!(
        h.controller.states().get(1).await.is_none(),
        "failed exchange must return the user to idle"
    );
    assert!(h
        .storage
        .get_credential(1)
        .await
        .expect("storage")
        .is_none());
}

#[tokio::test]
async fn media_requires_authentication() {
    let h = harness(None);

    h.controller.handle(media(1, small_video())).await;

    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("/auth"), "got: {reply}");
    assert!(h.controller.states().get(1).await.is_none());
}

#[tokio::test]
async fn oversized_and_unsupported_files_are_rejected_in_place() {
    let h = harness(None);
    authenticate(&h, 1).await;

    let huge = PendingFile {
        file_size: 50 * 1024 * 1024,
        ..small_video()
    };
    h.controller.handle(media(1, huge)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("File too large"), "got: {reply}");
    assert!(h.controller.states().get(1).await.is_none());

    let hollow = PendingFile {
        file_size: 0,
        ..small_video()
    };
    h.controller.handle(media(1, hollow)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("file is empty"), "got: {reply}");
    assert!(h.controller.states().get(1).await.is_none());

    let weird = PendingFile {
        mime_type: Some("application/pdf".to_string()),
        ..small_video()
    };
    h.controller.handle(media(1, weird)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("Unsupported file format"), "got: {reply}");
    assert!(h.controller.states().get(1).await.is_none());
}

#[tokio::test]
async fn overlong_title_keeps_the_title_step() {
    let h = harness(None);
    authenticate(&h, 1).await;
    h.controller.handle(media(1, small_video())).await;

    let long_title = "x".repeat(101);
    h.controller.handle(text(1, &long_title)).await;

    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("too long"), "got: {reply}");
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingTitle),
        "a rejected title must not advance the dialogue"
    );

    // Exactly 100 characters is accepted
    let max_title = "y".repeat(100);
    h.controller.handle(text(1, &max_title)).await;
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingDescription)
    );
}

#[tokio::test]
async fn full_upload_flow_with_skipped_description() {
    let h = harness(None);
    authenticate(&h, 1).await;

    h.controller.handle(media(1, small_video())).await;
    h.controller.handle(text(1, "My Trip")).await;
    h.controller.handle(text(1, "Skip")).await;

    // One transfer over the fake transport, driven to completion
    assert_eq!(h.transport.sessions.load(Ordering::SeqCst), 1);
    assert!(h.transport.chunks.load(Ordering::SeqCst) >= 4);

    let uploads = h.storage.get_user_uploads(1, 10).await.expect("storage");
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].title, "My Trip");
    assert_eq!(uploads[0].video_id, "vid-123");
    assert_eq!(
        uploads[0].description, DESCRIPTION_SIGNATURE,
        "a skipped description carries the signature alone"
    );

    let final_edit = h.chat.last_edit(1).await.expect("final edit");
    assert!(final_edit.contains("Upload successful"), "got: {final_edit}");
    assert!(final_edit.contains("watch?v=vid-123"), "got: {final_edit}");
    assert!(
        h.controller.states().get(1).await.is_none(),
        "state must clear after a completed upload"
    );
}

#[tokio::test]
async fn description_text_is_kept_verbatim_above_signature() {
    let h = harness(None);
    authenticate(&h, 2).await;

    h.controller.handle(media(2, small_video())).await;
    h.controller.handle(text(2, "Holiday")).await;
    h.controller.handle(text(2, "A week in the mountains")).await;

    let uploads = h.storage.get_user_uploads(2, 10).await.expect("storage");
    assert_eq!(
        uploads[0].description,
        format!("A week in the mountains\n\n{DESCRIPTION_SIGNATURE}")
    );
}

#[tokio::test]
async fn overlong_description_keeps_the_description_step() {
    let h = harness(None);
    authenticate(&h, 1).await;
    h.controller.handle(media(1, small_video())).await;
    h.controller.handle(text(1, "Title")).await;

    let long_description = "d".repeat(5001);
    h.controller.handle(text(1, &long_description)).await;

    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("Description is too long"), "got: {reply}");
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingDescription)
    );
    assert!(h
        .storage
        .get_user_uploads(1, 10)
        .await
        .expect("storage")
        .is_empty());
}

#[tokio::test]
async fn cancel_clears_any_step_and_reports_idle_otherwise() {
    let h = harness(None);
    authenticate(&h, 1).await;

    h.controller.handle(cmd(1, Command::Upload)).await;
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingVideo)
    );

    h.controller.handle(cmd(1, Command::Cancel)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("Operation cancelled"), "got: {reply}");
    assert!(h.controller.states().get(1).await.is_none());

    h.controller.handle(cmd(1, Command::Cancel)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("No operation to cancel"), "got: {reply}");
}

#[tokio::test]
async fn unsolicited_media_resets_description_state() {
    let h = harness(None);
    authenticate(&h, 1).await;

    h.controller.handle(media(1, small_video())).await;
    h.controller.handle(text(1, "First title")).await;
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingDescription)
    );

    // A new video mid-dialogue replaces the pending one and restarts at
    // the title step
    let second = PendingFile {
        file_name: "second.mp4".to_string(),
        ..small_video()
    };
    h.controller.handle(media(1, second)).await;

    let state = h.controller.states().get(1).await.expect("state");
    assert_eq!(state.step, Step::AwaitingTitle);
    assert_eq!(
        state.pending_file.expect("pending file").file_name,
        "second.mp4"
    );
    assert!(state.title.is_none(), "stale title must not survive");
}

#[tokio::test]
async fn users_do_not_share_dialogue_state() {
    let h = harness(None);
    authenticate(&h, 1).await;
    authenticate(&h, 2).await;

    h.controller.handle(media(1, small_video())).await;
    h.controller.handle(cmd(2, Command::Upload)).await;

    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingTitle)
    );
    assert_eq!(
        h.controller.states().get(2).await.map(|s| s.step),
        Some(Step::AwaitingVideo)
    );

    h.controller.handle(cmd(1, Command::Cancel)).await;
    assert!(h.controller.states().get(1).await.is_none());
    assert_eq!(
        h.controller.states().get(2).await.map(|s| s.step),
        Some(Step::AwaitingVideo),
        "cancelling one user must not touch another"
    );
}

#[tokio::test]
async fn history_and_stats_reflect_completed_uploads() {
    let h = harness(None);
    authenticate(&h, 1).await;

    h.controller.handle(cmd(1, Command::History)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("No uploads yet"), "got: {reply}");

    h.controller.handle(media(1, small_video())).await;
    h.controller.handle(text(1, "My Trip")).await;
    h.controller.handle(text(1, "skip")).await;

    h.controller.handle(cmd(1, Command::History)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("My Trip"), "got: {reply}");
    assert!(reply.contains("watch?v=vid-123"), "got: {reply}");

    h.controller.handle(cmd(1, Command::Stats)).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("Total uploads: <b>1</b>"), "got: {reply}");
    assert!(reply.contains("Your uploads: <b>1</b>"), "got: {reply}");
}

#[tokio::test]
async fn idle_text_gets_a_hint_and_wrong_step_text_a_nudge() {
    let h = harness(None);
    authenticate(&h, 1).await;

    h.controller.handle(text(1, "hello there")).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("/start"), "got: {reply}");

    h.controller.handle(cmd(1, Command::Upload)).await;
    h.controller.handle(text(1, "this is not a video")).await;
    let reply = h.chat.last_sent(1).await.expect("reply");
    assert!(reply.contains("don't understand"), "got: {reply}");
    assert_eq!(
        h.controller.states().get(1).await.map(|s| s.step),
        Some(Step::AwaitingVideo)
    );
}
