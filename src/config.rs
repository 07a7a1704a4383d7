//! Configuration and settings management
//!
//! Loads settings from environment variables and defines upload constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of Telegram user IDs allowed to use the bot.
    /// Empty or unset means unrestricted access.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,

    /// Maximum accepted video file size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,
}

/// 2 GiB, the Telegram bot API download ceiling
const fn default_max_file_size() -> u64 {
    2_147_483_648
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: check environment variables directly if config didn't pick
        // them up. Automatic UPPER_SNAKE_CASE mapping can miss these.
        if settings.r2_endpoint_url.is_none() {
            if let Ok(val) = std::env::var("R2_ENDPOINT_URL") {
                if !val.is_empty() {
                    settings.r2_endpoint_url = Some(val);
                }
            }
        }
        if settings.r2_access_key_id.is_none() {
            if let Ok(val) = std::env::var("R2_ACCESS_KEY_ID") {
                if !val.is_empty() {
                    settings.r2_access_key_id = Some(val);
                }
            }
        }
        if settings.r2_secret_access_key.is_none() {
            if let Ok(val) = std::env::var("R2_SECRET_ACCESS_KEY") {
                if !val.is_empty() {
                    settings.r2_secret_access_key = Some(val);
                }
            }
        }
        if settings.r2_bucket_name.is_none() {
            if let Ok(val) = std::env::var("R2_BUCKET_NAME") {
                if !val.is_empty() {
                    settings.r2_bucket_name = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Returns the set of Telegram IDs allowed to use the bot.
    /// An empty set means the bot is open to everyone.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when all four R2 connection parameters are present.
    #[must_use]
    pub fn r2_configured(&self) -> bool {
        self.r2_endpoint_url.is_some()
            && self.r2_access_key_id.is_some()
            && self.r2_secret_access_key.is_some()
            && self.r2_bucket_name.is_some()
    }
}

// YouTube API configuration
/// OAuth scope required for video uploads
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";
/// Google OAuth authorization endpoint
pub const OAUTH_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google OAuth token endpoint
pub const OAUTH_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Out-of-band redirect URI: the user copies the code back into the chat
pub const OAUTH_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
/// Resumable upload initiation endpoint
pub const UPLOAD_ENDPOINT: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";

// Fixed video metadata policy
/// YouTube category "People & Blogs"
pub const DEFAULT_CATEGORY_ID: &str = "22";
/// Privacy status forced on every upload regardless of caller input
pub const FORCED_PRIVACY_STATUS: &str = "private";

// Validation limits
/// Maximum video title length accepted by YouTube
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum video description length accepted by YouTube
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// MIME types accepted as video uploads
pub const SUPPORTED_VIDEO_MIME: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-flv",
    "video/x-matroska",
    "video/webm",
    "application/octet-stream",
];

// Upload engine tuning
/// Chunk size for resumable uploads (must be a multiple of 256 KiB)
pub const UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
/// Cumulative retry cap for transient chunk errors
pub const UPLOAD_MAX_RETRIES: u32 = 5;
/// Seconds between progress-message checkpoints during an upload
pub const PROGRESS_INTERVAL_SECS: u64 = 2;

// Unauthorized-denial cooldown cache
/// Seconds between "access denied" replies to the same user
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live for cooldown cache entries
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum number of cooldown cache entries
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;
