//! Utility functions: text truncation, size formatting, resilient Telegram retries.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Initial backoff delay for Telegram API retries (milliseconds)
const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Telegram API retries (milliseconds)
const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 8_000;
/// Maximum retry attempts for Telegram API operations
const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Truncate a string to at most `max_graphemes` grapheme clusters.
///
/// Grapheme-aware so multi-byte characters and emoji are never split.
#[must_use]
pub fn truncate_str(s: &str, max_graphemes: usize) -> String {
    s.graphemes(true).take(max_graphemes).collect()
}

/// Format a byte count as a human-readable size string.
///
/// # Examples
///
/// ```
/// use tube_courier::utils::format_file_size;
///
/// assert_eq!(format_file_size(512), "512.0 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Retry a Telegram API operation with exponential backoff and jitter.
///
/// Intended for transient network failures when sending or editing
/// messages; gives up after [`TELEGRAM_API_MAX_RETRIES`] attempts.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn retry_telegram_operation<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter) // Add jitter to prevent thundering herd
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
