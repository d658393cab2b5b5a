//! Google OAuth2 token endpoint calls.

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::client_secrets::ClientSecrets;
use crate::application::ports::{AuthError, Credential};

/// Successful token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// RFC 6749 error response.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// Google usually omits the refresh token from the answer, so the one sent
/// is carried over.
pub async fn refresh_grant(
    client: &Client,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> Result<Credential, AuthError> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
    ];
    let mut credential = request_token(client, &secrets.token_uri, &form).await?;
    if credential.refresh_token.is_none() {
        credential.refresh_token = Some(refresh_token.to_string());
    }
    Ok(credential)
}

/// Exchange an authorization code from the consent flow.
pub async fn code_grant(
    client: &Client,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
) -> Result<Credential, AuthError> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
    ];
    request_token(client, &secrets.token_uri, &form).await
}

async fn request_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<Credential, AuthError> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    if status.is_server_error() {
        return Err(AuthError::Transport(format!(
            "token endpoint returned {status}"
        )));
    }

    if !status.is_success() {
        let reason = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
            |_| format!("{status}: {body}"),
            |e| match e.error_description {
                Some(description) => format!("{}: {description}", e.error),
                None => e.error,
            },
        );
        return Err(AuthError::GrantRejected(reason));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| AuthError::GrantRejected(format!("malformed token response: {e}")))?;
    Ok(token.into_credential())
}

impl TokenResponse {
    fn into_credential(self) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            scope: self.scope,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}
