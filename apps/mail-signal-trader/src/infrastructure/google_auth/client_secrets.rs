//! OAuth client configuration (`credentials.json`).

use std::path::Path;

use serde::Deserialize;

use crate::application::ports::AuthError;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client id and endpoints.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Consent page.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Google wraps the client under `installed` (desktop) or `web`.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    /// Parse a client configuration document.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretsFile =
            serde_json::from_str(json).map_err(|e| AuthError::ClientConfig(e.to_string()))?;
        file.installed.or(file.web).ok_or_else(|| {
            AuthError::ClientConfig("expected an \"installed\" or \"web\" client".to_string())
        })
    }

    /// Read and parse a client configuration file.
    pub async fn load(path: &Path) -> Result<Self, AuthError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::ClientConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
