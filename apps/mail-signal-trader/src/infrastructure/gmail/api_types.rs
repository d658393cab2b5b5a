//! Gmail API request and response types (the fields the bot reads).

use serde::{Deserialize, Serialize};

/// `GET /labels` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelList {
    /// All labels of the mailbox.
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// A mailbox label.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    /// Label id used in queries.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// `GET /messages` response. `messages` is absent when nothing matches.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    /// Matching message references, newest first.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// Message reference from a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    /// Message id.
    pub id: String,
}

/// `GET /messages/{id}?format=full` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id.
    pub id: String,
    /// Receipt time in epoch milliseconds, as a decimal string.
    #[serde(default)]
    pub internal_date: Option<String>,
    /// Parsed MIME tree.
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type (`text/plain`, `multipart/alternative`, ...).
    #[serde(default)]
    pub mime_type: String,
    /// Headers of this part.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Inline body data.
    #[serde(default)]
    pub body: Option<PartBody>,
    /// Child parts of a multipart node.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// First header with the given name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Base64url body data, if inline.
    #[must_use]
    pub fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

/// A MIME header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Body of a MIME part.
#[derive(Debug, Clone, Deserialize)]
pub struct PartBody {
    /// Base64url-encoded content.
    #[serde(default)]
    pub data: Option<String>,
}

/// `POST /messages/{id}/modify` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    /// Labels to remove.
    pub remove_label_ids: Vec<String>,
}

impl ModifyRequest {
    /// Remove the `UNREAD` system label.
    #[must_use]
    pub fn mark_read() -> Self {
        Self {
            remove_label_ids: vec!["UNREAD".to_string()],
        }
    }
}

/// Google API error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    /// Error details.
    pub error: GoogleError,
}

/// Google API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleError {
    /// Error message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_has_no_messages() {
        let list: MessageList = serde_json::from_str(r#"{"resultSizeEstimate":0}"#).unwrap();
        assert!(list.messages.is_empty());
    }

    #[test]
    fn message_parses_camel_case_fields() {
        let message: Message = serde_json::from_str(
            r#"{
                "id": "18c",
                "internalDate": "1700000000000",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{"name": "Subject", "value": "Alert"}],
                    "body": {"size": 4, "data": "dGVzdA"}
                }
            }"#,
        )
        .unwrap();

        let payload = message.payload.unwrap();
        assert_eq!(message.internal_date.as_deref(), Some("1700000000000"));
        assert_eq!(payload.header("subject"), Some("Alert"));
        assert_eq!(payload.data(), Some("dGVzdA"));
    }

    #[test]
    fn modify_request_serializes_camel_case() {
        let json = serde_json::to_value(ModifyRequest::mark_read()).unwrap();
        assert_eq!(json["removeLabelIds"][0], "UNREAD");
    }
}
