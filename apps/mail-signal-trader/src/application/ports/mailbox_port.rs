//! Mailbox Port (Driven Port)
//!
//! Interface for reading signal emails and marking them processed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::credential_port::AuthError;
use crate::domain::signal::MessageId;

/// An unread message with decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Mailbox message id.
    pub id: MessageId,
    /// Subject header (empty when absent).
    pub subject: String,
    /// Decoded body text (empty when no text part was found).
    pub body: String,
    /// When the mailbox received the message.
    pub received_at: DateTime<Utc>,
}

/// Mailbox port error.
#[derive(Debug, Clone, Error)]
pub enum MailboxError {
    /// Credential could not be obtained. Fatal unless the token endpoint was
    /// merely unreachable.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The configured label does not exist.
    #[error("label '{0}' not found")]
    LabelNotFound(String),

    /// The API answered with an error status.
    #[error("mailbox API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The request never got an answer.
    #[error("mailbox transport error: {0}")]
    Transport(String),

    /// The response body was not what the API documents.
    #[error("mailbox response could not be decoded: {0}")]
    Decode(String),
}

impl MailboxError {
    /// Whether the bot must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Auth(err) => !err.is_transient(),
            _ => false,
        }
    }
}

/// Port for mailbox access.
#[async_trait]
pub trait MailboxPort: Send + Sync {
    /// Unread messages under `label`, at most `max_results`, newest first.
    async fn fetch_unread(
        &self,
        label: &str,
        max_results: u32,
    ) -> Result<Vec<MailMessage>, MailboxError>;

    /// Mark a message read so later polls skip it.
    async fn mark_read(&self, message_id: &MessageId) -> Result<(), MailboxError>;
}
