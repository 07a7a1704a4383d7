//! User-facing message formatting (Telegram HTML).
//!
//! Every reply the bot sends is built here so the dialogue logic stays free
//! of markup. User-provided text is always escaped with `html_escape`.

use crate::storage::UploadRecord;
use crate::utils::format_file_size;

/// Signature line appended to every uploaded video's description
pub const DESCRIPTION_SIGNATURE: &str = "📤 Uploaded via Tube Courier";

/// Welcome message for /start
#[must_use]
pub fn welcome(first_name: &str) -> String {
    format!(
        "🎬 <b>Welcome to Tube Courier!</b> 🎬\n\n\
         Hello <b>{}</b>! 👋\n\n\
         This bot uploads videos straight to YouTube. Available commands:\n\
         • /start - Show this welcome message\n\
         • /auth - Connect your YouTube account\n\
         • /upload - Upload a video to YouTube\n\
         • /history - View your upload history\n\
         • /stats - View bot statistics\n\
         • /help - Detailed instructions\n\
         • /cancel - Cancel the current operation\n\n\
         🔐 <b>Getting started:</b>\n\
         1. Use /auth to connect your YouTube account\n\
         2. Send a video file\n\
         3. Follow the prompts for title and description\n\n\
         <i>Uploads are private by default.</i>",
        html_escape::encode_text(first_name)
    )
}

/// Detailed help for /help
#[must_use]
pub fn help() -> String {
    "❓ <b>How to use Tube Courier</b>\n\n\
     1️⃣ <b>Authenticate</b>: send /auth, open the link, grant access and \
     paste the code you receive back into this chat.\n\
     2️⃣ <b>Upload</b>: send /upload (or just send a video file), then \
     answer the prompts for title and description. Send <code>skip</code> \
     to leave the description empty.\n\
     3️⃣ <b>Review</b>: /history shows your last uploads, /stats shows \
     totals.\n\n\
     ℹ️ Supported formats: MP4, AVI, MOV, FLV, MKV, WebM. \
     Videos are uploaded as <b>private</b>; change visibility in YouTube \
     Studio.\n\
     🚫 /cancel aborts the current dialogue at any step."
        .to_string()
}

/// Authorization URL prompt, entering the auth-code step
#[must_use]
pub fn auth_prompt(auth_url: &str) -> String {
    format!(
        "🔐 <b>YouTube authentication required</b>\n\n\
         1. Open <a href=\"{}\">this authorization link</a>\n\
         2. Sign in and allow access to your channel\n\
         3. Copy the code Google shows you\n\
         4. Send that code here as a message\n\n\
         <i>Send /cancel to abort.</i>",
        html_escape::encode_double_quoted_attribute(auth_url)
    )
}

/// Shown when /auth is issued by an already-authenticated user
#[must_use]
pub fn already_authenticated() -> String {
    "✅ You are already authenticated! You can start uploading videos.".to_string()
}

/// Successful code exchange
#[must_use]
pub fn auth_success(first_name: &str) -> String {
    format!(
        "✅ <b>Authentication successful!</b>\n\n\
         Welcome aboard, {}! Send a video file or use /upload to begin.",
        html_escape::encode_text(first_name)
    )
}

/// Invalid or expired authorization code
#[must_use]
pub fn auth_invalid_code() -> String {
    "❌ Invalid authorization code. Please try /auth again.".to_string()
}

/// A command or media event that requires authentication
#[must_use]
pub fn auth_required() -> String {
    "🔐 Please authenticate first using the /auth command.".to_string()
}

/// Uniform allow-list rejection
#[must_use]
pub fn access_denied() -> String {
    "⛔️ You are not authorized to use this bot.".to_string()
}

/// Prompt after /upload
#[must_use]
pub fn upload_prompt() -> String {
    "📤 <b>Ready to upload!</b>\n\nSend me the video file you want to publish.".to_string()
}

/// Video received; ask for the title
#[must_use]
pub fn video_details_prompt(file_name: &str, file_size: u64) -> String {
    format!(
        "🎬 <b>Video received</b>\n\n\
         📁 File: <code>{}</code>\n\
         💾 Size: {}\n\n\
         ✏️ Now send the video title (max 100 characters):",
        html_escape::encode_text(file_name),
        format_file_size(file_size)
    )
}

/// File exceeds the configured maximum
#[must_use]
pub fn file_too_large(file_size: u64, max_size: u64) -> String {
    format!(
        "❌ File too large ({}). Maximum allowed size is {}.",
        format_file_size(file_size),
        format_file_size(max_size)
    )
}

/// Zero-byte file; nothing to upload
#[must_use]
pub fn empty_file() -> String {
    "❌ This file is empty. Please send a video with actual content.".to_string()
}

/// MIME type is not in the supported set
#[must_use]
pub fn unsupported_format() -> String {
    "❌ Unsupported file format. Please send MP4, AVI, MOV, FLV, MKV or WebM files.".to_string()
}

/// Title longer than the platform limit
#[must_use]
pub fn title_too_long() -> String {
    "❌ Title is too long. Please keep it under 100 characters.".to_string()
}

/// Title accepted; ask for the description
#[must_use]
pub fn title_set(title: &str) -> String {
    format!(
        "✅ Title set: <b>{}</b>\n\n\
         📝 Now send the video description (optional - send 'skip' to skip):",
        html_escape::encode_text(title)
    )
}

/// Description longer than the platform limit
#[must_use]
pub fn description_too_long() -> String {
    "❌ Description is too long. Please keep it under 5000 characters.".to_string()
}

/// Initial progress message while the file is fetched from Telegram
#[must_use]
pub fn upload_preparing() -> String {
    "⏳ <b>Preparing upload...</b>\n\nDownloading video file...".to_string()
}

/// Download from the chat transport failed
#[must_use]
pub fn download_failed() -> String {
    "❌ Failed to download the video file. Please try again.".to_string()
}

/// Progress checkpoint with a ten-segment bar
#[must_use]
pub fn upload_progress(percent: u8, file_name: &str) -> String {
    let filled = usize::from(percent / 10).min(10);
    let bar: String = "█".repeat(filled) + &"░".repeat(10 - filled);
    format!(
        "📤 <b>Uploading to YouTube...</b>\n\n\
         📁 <code>{}</code>\n\
         {bar} {percent}%",
        html_escape::encode_text(file_name)
    )
}

/// Final success message replacing the progress message
#[must_use]
pub fn upload_success(record: &UploadRecord) -> String {
    format!(
        "🎉 <b>Upload successful!</b>\n\n\
         🎬 <b>{}</b>\n\
         🔗 <a href=\"{}\">Watch on YouTube</a>\n\
         📁 <code>{}</code> ({})\n\n\
         <i>The video is private; change visibility in YouTube Studio.</i>",
        html_escape::encode_text(&record.title),
        html_escape::encode_double_quoted_attribute(&record.url),
        html_escape::encode_text(&record.file_name),
        format_file_size(record.file_size)
    )
}

/// Upload failure with a reason
#[must_use]
pub fn upload_error(reason: &str) -> String {
    format!(
        "❌ <b>Upload failed</b>\n\n{}\n\nPlease try again.",
        html_escape::encode_text(reason)
    )
}

/// A second upload attempted while one is in flight
#[must_use]
pub fn upload_in_progress() -> String {
    "⏳ An upload is already in progress. Please wait for it to finish.".to_string()
}

/// Cancellation acknowledged
#[must_use]
pub fn cancel_done() -> String {
    "✅ Operation cancelled.".to_string()
}

/// Cancel with nothing to cancel
#[must_use]
pub fn cancel_noop() -> String {
    "ℹ️ No operation to cancel.".to_string()
}

/// Free text with no active dialogue step
#[must_use]
pub fn idle_hint() -> String {
    "ℹ️ Send /start to begin or /help for available commands.".to_string()
}

/// Free text in a step that expects something else
#[must_use]
pub fn unknown_input() -> String {
    "ℹ️ I don't understand. Use /help for available commands.".to_string()
}

/// Generic internal-error reply
#[must_use]
pub fn generic_error() -> String {
    "❌ An error occurred. Please try again.".to_string()
}

/// Upload history, newest first
#[must_use]
pub fn history(uploads: &[UploadRecord]) -> String {
    if uploads.is_empty() {
        return "📋 <b>Upload history</b>\n\nNo uploads yet. Send a video to get started!"
            .to_string();
    }

    let mut lines = vec![format!("📋 <b>Upload history</b> ({} shown)\n", uploads.len())];
    for (i, record) in uploads.iter().enumerate() {
        lines.push(format!(
            "{}. <a href=\"{}\">{}</a>\n   📅 {} │ 💾 {}",
            i + 1,
            html_escape::encode_double_quoted_attribute(&record.url),
            html_escape::encode_text(&record.title),
            record.uploaded_at.format("%Y-%m-%d %H:%M"),
            format_file_size(record.file_size)
        ));
    }
    lines.join("\n")
}

/// Bot-wide and per-user statistics
#[must_use]
pub fn stats(total_users: u64, total_uploads: u64, user_uploads: u64) -> String {
    format!(
        "📊 <b>Bot statistics</b>\n\n\
         👤 Total users: <b>{total_users}</b>\n\
         📤 Total uploads: <b>{total_uploads}</b>\n\
         🎬 Your uploads: <b>{user_uploads}</b>"
    )
}
