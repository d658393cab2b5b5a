//! Gmail REST client implementing [`MailboxPort`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::sync::Mutex;

use super::api_types::{GoogleErrorResponse, LabelList, Message, MessageList, ModifyRequest};
use super::body::extract_body;
use crate::application::ports::{
    AuthError, CredentialProvider, MailMessage, MailboxError, MailboxPort,
};
use crate::application::services::CredentialCache;
use crate::domain::signal::MessageId;

/// Gmail API root for the authorized user.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailbox adapter for a single Gmail account.
pub struct GmailMailbox<P: CredentialProvider> {
    client: Client,
    base_url: String,
    credentials: CredentialCache<P>,
    /// Lowercased label name to label id.
    labels: Mutex<HashMap<String, String>>,
}

impl<P: CredentialProvider> GmailMailbox<P> {
    /// Create an adapter against the public Gmail API.
    pub fn new(credentials: CredentialCache<P>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: GMAIL_API_BASE.to_string(),
            credentials,
            labels: Mutex::new(HashMap::new()),
        })
    }

    /// Point the adapter at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Obtain a usable access token now, running the consent flow if needed.
    pub async fn authorize(&self) -> Result<(), AuthError> {
        self.credentials.access_token().await.map(|_| ())
    }

    /// Resolve a label name to its id, case-insensitively.
    async fn label_id(&self, name: &str) -> Result<String, MailboxError> {
        let key = name.to_lowercase();
        if let Some(id) = self.labels.lock().await.get(&key) {
            return Ok(id.clone());
        }

        let list: LabelList = self.send(Method::GET, "/labels", &[], None).await?;
        let mut labels = self.labels.lock().await;
        labels.clear();
        labels.extend(
            list.labels
                .into_iter()
                .map(|label| (label.name.to_lowercase(), label.id)),
        );

        labels.get(&key).cloned().ok_or_else(|| {
            tracing::error!(label = name, known = labels.len(), "Label not found");
            MailboxError::LabelNotFound(name.to_string())
        })
    }

    async fn get_message(&self, id: &str) -> Result<Message, MailboxError> {
        let query = [("format", "full".to_string())];
        self.send(Method::GET, &format!("/messages/{id}"), &query, None)
            .await
    }

    /// Send an authorized request, refreshing the token once on `401`.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&ModifyRequest>,
    ) -> Result<T, MailboxError> {
        let url = format!("{}{path}", self.base_url);
        let mut token = self.credentials.access_token().await?;
        let mut refreshed = false;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .query(query);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = request
                .send()
                .await
                .map_err(|e| MailboxError::Transport(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed {
                    return Err(AuthError::Rejected.into());
                }
                token = self.credentials.force_refresh().await?;
                refreshed = true;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| MailboxError::Transport(e.to_string()))?;

            if !status.is_success() {
                return Err(MailboxError::Api {
                    status: status.as_u16(),
                    message: error_message(&text),
                });
            }

            return serde_json::from_str(&text).map_err(|e| MailboxError::Decode(e.to_string()));
        }
    }
}

#[async_trait]
impl<P: CredentialProvider> MailboxPort for GmailMailbox<P> {
    async fn fetch_unread(
        &self,
        label: &str,
        max_results: u32,
    ) -> Result<Vec<MailMessage>, MailboxError> {
        let label_id = self.label_id(label).await?;
        let query = [
            ("labelIds", label_id),
            ("q", "is:unread".to_string()),
            ("maxResults", max_results.to_string()),
        ];

        let list: MessageList = match self.send(Method::GET, "/messages", &query, None).await {
            Ok(list) => list,
            Err(e) => {
                // A deleted or renamed label surfaces here; resolve it again next poll.
                if matches!(e, MailboxError::Api { status: 400 | 404, .. }) {
                    self.labels.lock().await.clear();
                }
                return Err(e);
            }
        };

        let mut messages = Vec::with_capacity(list.messages.len());
        for reference in list.messages {
            match self.get_message(&reference.id).await {
                Ok(message) => messages.push(to_mail_message(message)),
                Err(e @ MailboxError::Auth(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(message_id = %reference.id, error = %e, "Skipping unreadable message");
                }
            }
        }

        tracing::debug!(label, count = messages.len(), "Fetched unread messages");
        Ok(messages)
    }

    async fn mark_read(&self, message_id: &MessageId) -> Result<(), MailboxError> {
        let path = format!("/messages/{message_id}/modify");
        let _: IgnoredAny = self
            .send(Method::POST, &path, &[], Some(&ModifyRequest::mark_read()))
            .await?;
        Ok(())
    }
}

/// Message text of a Google error envelope, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |e| e.error.message)
}

fn to_mail_message(message: Message) -> MailMessage {
    let received_at = message
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(|| {
            tracing::warn!(message_id = %message.id, "Message has no usable internalDate");
            Utc::now()
        });

    let (subject, body) = message.payload.as_ref().map_or_else(
        || (String::new(), String::new()),
        |payload| {
            (
                payload.header("Subject").unwrap_or_default().to_string(),
                extract_body(payload).unwrap_or_default(),
            )
        },
    );

    if body.is_empty() {
        tracing::warn!(message_id = %message.id, "Message has no text body");
    }

    MailMessage {
        id: MessageId::new(message.id),
        subject,
        body,
        received_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_full_message() {
        let message: Message = serde_json::from_str(
            r#"{
                "id": "abc",
                "internalDate": "1700000000000",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{"name": "SUBJECT", "value": "Signal"}],
                    "body": {"data": "QlVZIEFBUEw"}
                }
            }"#,
        )
        .unwrap();

        let mail = to_mail_message(message);
        assert_eq!(mail.id.as_str(), "abc");
        assert_eq!(mail.subject, "Signal");
        assert_eq!(mail.body, "BUY AAPL");
        assert_eq!(mail.received_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn message_without_payload_has_empty_text() {
        let message: Message = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        let before = Utc::now();
        let mail = to_mail_message(message);
        assert!(mail.subject.is_empty());
        assert!(mail.body.is_empty());
        assert!(mail.received_at >= before);
    }

    #[test]
    fn google_error_message_is_extracted() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"Invalid label"}}"#),
            "Invalid label"
        );
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}
