//! Credential Port (Driven Port)
//!
//! Interface for loading and refreshing the mailbox OAuth2 credential.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens are treated as expired this long before their real expiry.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// An OAuth2 token set for the mailbox account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent with API requests.
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes, space separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// Whether the access token is expired (or about to be) at `now`.
    ///
    /// A credential without an expiry never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            let skew = chrono::Duration::from_std(EXPIRY_SKEW).unwrap_or_default();
            now + skew >= expires_at
        })
    }

    /// Whether the credential can be refreshed without user interaction.
    #[must_use]
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Errors from credential handling. Everything except [`AuthError::Transport`]
/// stops the bot.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No stored token and interactive authorization is not allowed.
    #[error("no stored credential at {path} and interactive authorization is disabled")]
    MissingCredential {
        /// Expected token file.
        path: String,
    },

    /// OAuth client configuration could not be read.
    #[error("invalid OAuth client configuration: {0}")]
    ClientConfig(String),

    /// Stored token exists but cannot be refreshed.
    #[error("credential expired and has no refresh token")]
    NotRefreshable,

    /// The token endpoint refused the refresh token or authorization code.
    #[error("token endpoint rejected the grant: {0}")]
    GrantRejected(String),

    /// The mailbox API refused a freshly refreshed token.
    #[error("mailbox rejected the credential")]
    Rejected,

    /// The interactive consent flow failed.
    #[error("authorization flow failed: {0}")]
    Authorization(String),

    /// Token endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// Token file could not be read or written.
    #[error("credential storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether the failure was the token endpoint being unreachable, so a
    /// later attempt may succeed with the same refresh token.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Capability to obtain a usable mailbox credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Load the persisted credential, authorizing interactively if allowed
    /// and nothing is stored yet.
    async fn load(&self) -> Result<Credential, AuthError>;

    /// Exchange the refresh token for a new access token and persist it.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;

    /// Whether the credential can be used right now.
    fn is_valid(&self, credential: &Credential) -> bool {
        !credential.access_token.is_empty() && !credential.is_expired_at(Utc::now())
    }
}
