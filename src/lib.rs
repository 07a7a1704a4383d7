#![deny(missing_docs)]
//! Tube Courier - Telegram to YouTube uploader bot
//!
//! A Telegram bot that walks a user through OAuth authentication against
//! YouTube and uploads video files sent in chat, with a multi-step dialogue
//! (auth code, video, title, description) and per-user upload history.

/// Dialogue controller, conversation state and inbound events
pub mod dialogue;
/// User-facing message formatting (Telegram HTML)
pub mod messages;
/// Persistence layer (R2/S3 or in-memory)
pub mod storage;
/// Telegram transport adapter
pub mod telegram;
/// YouTube OAuth flow and resumable upload engine
pub mod youtube;

/// Configuration management
pub mod config;
pub mod utils;
