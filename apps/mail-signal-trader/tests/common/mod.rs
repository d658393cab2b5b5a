//! Shared fixtures for the HTTP-level integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use mail_signal_trader::{AuthError, Credential, CredentialProvider};
use serde_json::{Value, json};

/// Credential provider serving `token-1`, refreshing to `token-2`.
pub struct StaticProvider {
    refresh_error: Option<AuthError>,
    refreshes: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::failing_refresh(None)
    }

    /// Provider whose refresh grant is revoked.
    pub fn revoked() -> Self {
        Self::failing_refresh(Some(AuthError::GrantRejected("invalid_grant".to_string())))
    }

    /// Provider whose token endpoint cannot be reached.
    pub fn unreachable() -> Self {
        Self::failing_refresh(Some(AuthError::Transport(
            "token endpoint returned 503 Service Unavailable".to_string(),
        )))
    }

    fn failing_refresh(refresh_error: Option<AuthError>) -> Self {
        Self {
            refresh_error,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

fn credential(token: &str) -> Credential {
    Credential {
        access_token: token.to_string(),
        refresh_token: Some("1//refresh".to_string()),
        expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        scope: None,
        token_type: "Bearer".to_string(),
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn load(&self) -> Result<Credential, AuthError> {
        Ok(credential("token-1"))
    }

    async fn refresh(&self, _credential: &Credential) -> Result<Credential, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match &self.refresh_error {
            None => Ok(credential("token-2")),
            Some(err) => Err(err.clone()),
        }
    }
}

/// `GET /labels` body with the given `(id, name)` pairs.
pub fn labels(pairs: &[(&str, &str)]) -> Value {
    let labels: Vec<Value> = pairs
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name, "type": "user"}))
        .collect();
    json!({ "labels": labels })
}

/// `GET /messages` body listing the given ids.
pub fn listing(ids: &[&str]) -> Value {
    let messages: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "threadId": id}))
        .collect();
    json!({ "messages": messages, "resultSizeEstimate": ids.len() })
}

/// `GET /messages/{id}?format=full` body for a received-just-now message.
pub fn plain_message(id: &str, subject: &str, body: &str) -> Value {
    message_at(id, subject, body, Utc::now().timestamp_millis())
}

/// Like [`plain_message`] with an explicit `internalDate`.
pub fn message_at(id: &str, subject: &str, body: &str, internal_date_ms: i64) -> Value {
    json!({
        "id": id,
        "threadId": id,
        "labelIds": ["UNREAD", "Label_1"],
        "internalDate": internal_date_ms.to_string(),
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                {"name": "From", "value": "alerts@example.com"},
                {"name": "Subject", "value": subject}
            ],
            "body": {"size": 0},
            "parts": [
                {
                    "mimeType": "text/plain",
                    "headers": [],
                    "body": {"size": body.len(), "data": URL_SAFE_NO_PAD.encode(body)}
                },
                {
                    "mimeType": "text/html",
                    "headers": [],
                    "body": {"data": URL_SAFE_NO_PAD.encode(format!("<p>{body}</p>"))}
                }
            ]
        }
    })
}
