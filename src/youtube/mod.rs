//! YouTube integration: OAuth 2.0 authorization-code flow and the
//! chunked resumable upload engine.

/// OAuth flow and per-user token store
pub mod oauth;
/// Resumable upload engine and transport
pub mod upload;

pub use oauth::{AuthError, GoogleOauth, OauthFlow, TokenStore};
pub use upload::{
    ChunkOutcome, ResumableTransport, UploadEngine, UploadError, UploadRequest, UploadTransport,
    VideoMeta,
};
