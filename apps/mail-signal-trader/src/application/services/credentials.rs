//! Credential Cache
//!
//! Keeps the current mailbox credential in memory and refreshes it through
//! the [`CredentialProvider`] when it expires or the API refuses it.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::application::ports::{AuthError, Credential, CredentialProvider};

/// In-memory holder of the mailbox credential.
pub struct CredentialCache<P: CredentialProvider> {
    provider: Arc<P>,
    current: Mutex<Option<Credential>>,
}

impl<P: CredentialProvider> CredentialCache<P> {
    /// Create an empty cache; the credential is loaded on first use.
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            current: Mutex::new(None),
        }
    }

    /// A valid access token, loading or refreshing as needed.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;

        let credential = match current.take() {
            Some(credential) => credential,
            None => self.provider.load().await?,
        };

        let credential = if self.provider.is_valid(&credential) {
            credential
        } else {
            if !credential.is_refreshable() {
                return Err(AuthError::NotRefreshable);
            }
            tracing::info!("Mailbox access token expired, refreshing");
            match self.provider.refresh(&credential).await {
                Ok(refreshed) => refreshed,
                Err(err) => {
                    *current = Some(credential);
                    return Err(err);
                }
            }
        };

        let token = credential.access_token.clone();
        *current = Some(credential);
        Ok(token)
    }

    /// Refresh even though the token looked valid (the API answered 401).
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;

        let credential = match current.take() {
            Some(credential) => credential,
            None => self.provider.load().await?,
        };

        if !credential.is_refreshable() {
            return Err(AuthError::Rejected);
        }

        tracing::warn!("Mailbox rejected access token, forcing refresh");
        let refreshed = match self.provider.refresh(&credential).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                *current = Some(credential);
                return Err(err);
            }
        };
        let token = refreshed.access_token.clone();
        *current = Some(refreshed);
        Ok(token)
    }
}
