//! Token file persistence and refresh.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::client_secrets::ClientSecrets;
use super::consent::{CONSENT_TIMEOUT, LoopbackReceiver, authorization_url};
use super::token_endpoint::{code_grant, refresh_grant};
use crate::application::ports::{AuthError, Credential, CredentialProvider};
use crate::infrastructure::atomic_file::write_atomic;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// [`CredentialProvider`] backed by a JSON token file.
#[derive(Debug)]
pub struct GoogleTokenStore {
    client: Client,
    client_secrets_path: PathBuf,
    token_path: PathBuf,
    interactive: bool,
}

impl GoogleTokenStore {
    /// Create a store for the given client configuration and token file.
    pub fn new(
        client_secrets_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        interactive: bool,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(TOKEN_TIMEOUT).build()?,
            client_secrets_path: client_secrets_path.into(),
            token_path: token_path.into(),
            interactive,
        })
    }

    /// Token file location.
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    async fn read_token(&self) -> Result<Option<Credential>, AuthError> {
        let json = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.storage_error(&e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| self.storage_error(&e))
    }

    async fn persist(&self, credential: &Credential) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(credential).map_err(|e| self.storage_error(&e))?;
        write_atomic(&self.token_path, &json)
            .await
            .map_err(|e| self.storage_error(&e))
    }

    fn storage_error(&self, e: &dyn std::fmt::Display) -> AuthError {
        AuthError::Storage(format!("{}: {e}", self.token_path.display()))
    }

    async fn authorize_interactively(&self) -> Result<Credential, AuthError> {
        let secrets = ClientSecrets::load(&self.client_secrets_path).await?;
        let receiver = LoopbackReceiver::bind().await?;
        let url = authorization_url(&secrets, receiver.redirect_uri(), receiver.state())?;
        let redirect_uri = receiver.redirect_uri().to_string();

        tracing::warn!("No stored mailbox token, waiting for browser authorization");
        println!("Open this URL in a browser to authorize mailbox access:\n\n{url}\n");

        let code = receiver.wait_for_code(CONSENT_TIMEOUT).await?;
        let credential = code_grant(&self.client, &secrets, &code, &redirect_uri).await?;
        if !credential.is_refreshable() {
            tracing::warn!("Authorization returned no refresh token; re-consent will be needed");
        }
        Ok(credential)
    }
}

#[async_trait]
impl CredentialProvider for GoogleTokenStore {
    async fn load(&self) -> Result<Credential, AuthError> {
        if let Some(credential) = self.read_token().await? {
            tracing::debug!(path = %self.token_path.display(), "Loaded stored mailbox token");
            return Ok(credential);
        }

        if !self.interactive {
            return Err(AuthError::MissingCredential {
                path: self.token_path.display().to_string(),
            });
        }

        let credential = self.authorize_interactively().await?;
        self.persist(&credential).await?;
        tracing::info!(path = %self.token_path.display(), "Mailbox authorized, token saved");
        Ok(credential)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotRefreshable)?;

        let secrets = ClientSecrets::load(&self.client_secrets_path).await?;
        let refreshed = refresh_grant(&self.client, &secrets, refresh_token).await?;
        self.persist(&refreshed).await?;

        tracing::info!(expires_at = ?refreshed.expires_at, "Mailbox token refreshed");
        Ok(refreshed)
    }
}
