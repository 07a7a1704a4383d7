//! Google OAuth 2.0 authorization-code flow and per-user credential refresh.
//!
//! The HTTP round-trips live behind the [`OauthFlow`] trait so the dialogue
//! tests can substitute a fake. [`TokenStore`] binds a flow to the
//! persistence layer: exchanged and refreshed credentials are written back
//! so subsequent calls reuse the new access token.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{
    Settings, OAUTH_AUTH_ENDPOINT, OAUTH_REDIRECT_URI, OAUTH_TOKEN_ENDPOINT, YOUTUBE_UPLOAD_SCOPE,
};
use crate::storage::{Storage, StorageError, StoredCredential};
use std::sync::Arc;

/// Margin subtracted from the token expiry to absorb clock skew
const EXPIRY_SKEW_SECS: i64 = 60;

/// Errors produced by the OAuth flow and token store
#[derive(Error, Debug)]
pub enum AuthError {
    /// The authorization code was rejected by the token endpoint
    #[error("authorization code rejected: {0}")]
    CodeRejected(String),
    /// The refresh round-trip failed; fatal to the current upload attempt
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    /// The token endpoint could not be reached
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    /// Credential persistence failed
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

/// OAuth round-trips against the platform's token endpoint
#[async_trait]
pub trait OauthFlow: Send + Sync {
    /// The authorization URL the user opens in a browser.
    fn authorize_url(&self) -> String;

    /// Exchange an authorization code for a credential.
    async fn exchange_code(&self, code: &str) -> Result<StoredCredential, AuthError>;

    /// Perform a refresh round-trip and return the updated credential.
    /// The refresh token is retained unless the platform issues a new one.
    async fn refresh(&self, credential: &StoredCredential) -> Result<StoredCredential, AuthError>;
}

/// Token endpoint success payload
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Real OAuth flow against Google's endpoints
pub struct GoogleOauth {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl GoogleOauth {
    /// Build the flow from application settings
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            client_id: settings.google_client_id.clone(),
            client_secret: settings.google_client_secret.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn credential_from_response(
        &self,
        response: TokenResponse,
        previous_refresh_token: Option<String>,
    ) -> StoredCredential {
        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        StoredCredential {
            access_token: response.access_token,
            // A refresh token is only issued on the initial exchange (or when
            // the platform rotates it); keep the previous one otherwise.
            refresh_token: response.refresh_token.or(previous_refresh_token),
            token_endpoint: OAUTH_TOKEN_ENDPOINT.to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: vec![YOUTUBE_UPLOAD_SCOPE.to_string()],
            expires_at,
        }
    }
}

#[async_trait]
impl OauthFlow for GoogleOauth {
    fn authorize_url(&self) -> String {
        let url = reqwest::Url::parse_with_params(
            OAUTH_AUTH_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", OAUTH_REDIRECT_URI),
                ("response_type", "code"),
                ("scope", YOUTUBE_UPLOAD_SCOPE),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
            ],
        );
        match url {
            Ok(u) => u.to_string(),
            // The base endpoint is a compile-time constant; parsing cannot
            // fail, but the fallback keeps the path total.
            Err(_) => OAUTH_AUTH_ENDPOINT.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredCredential, AuthError> {
        let response = self
            .http
            .post(OAUTH_TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", OAUTH_REDIRECT_URI),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::CodeRejected(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(self.credential_from_response(token, None))
    }

    async fn refresh(&self, credential: &StoredCredential) -> Result<StoredCredential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token on record".into()))?;

        let response = self
            .http
            .post(&credential.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(self.credential_from_response(token, credential.refresh_token.clone()))
    }
}

/// Per-user credential management: code exchange, transparent refresh,
/// write-back of updated credential material.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    flow: Arc<dyn OauthFlow>,
}

impl TokenStore {
    /// Bind an OAuth flow to the persistence layer
    pub fn new(storage: Arc<dyn Storage>, flow: Arc<dyn OauthFlow>) -> Self {
        Self { storage, flow }
    }

    /// The authorization URL for the user to open
    #[must_use]
    pub fn authorize_url(&self) -> String {
        self.flow.authorize_url()
    }

    /// Exchange an authorization code, persist the credential and mark the
    /// user authenticated.
    ///
    /// # Errors
    ///
    /// [`AuthError::CodeRejected`] for an invalid or expired code,
    /// [`AuthError::Transport`] when the token endpoint is unreachable.
    pub async fn exchange_code_for_token(
        &self,
        user_id: i64,
        code: &str,
    ) -> Result<StoredCredential, AuthError> {
        let credential = self.flow.exchange_code(code.trim()).await?;
        self.storage.save_credential(user_id, &credential).await?;
        self.storage.set_authenticated(user_id, true).await?;
        info!("OAuth credential stored for user {}", user_id);
        Ok(credential)
    }

    /// Return a credential with a non-expired access token, refreshing and
    /// persisting it first when needed. Calling on a fresh credential is a
    /// no-op (no refresh round-trip).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailed`] when the token is expired and
    /// cannot be refreshed; the caller treats this as an upload failure.
    pub async fn ensure_fresh(
        &self,
        user_id: i64,
        credential: StoredCredential,
    ) -> Result<StoredCredential, AuthError> {
        if !is_expired(&credential) {
            return Ok(credential);
        }

        warn!("Access token expired for user {}, refreshing", user_id);
        let refreshed = self.flow.refresh(&credential).await?;
        self.storage.save_credential(user_id, &refreshed).await?;
        info!("Access token refreshed for user {}", user_id);
        Ok(refreshed)
    }
}

/// An access token without a known expiry is treated as expired.
fn is_expired(credential: &StoredCredential) -> bool {
    match credential.expires_at {
        Some(expires_at) => expires_at <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
        None => true,
    }
}
