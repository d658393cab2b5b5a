//! Gmail Mailbox Adapter
//!
//! Implementation of `MailboxPort` over the Gmail REST API:
//! - Label lookup by case-insensitive name (cached)
//! - Unread listing, full message fetch, and mark-read via `modify`
//! - One forced token refresh on `401`
//! - MIME body extraction preferring `text/plain`

mod api_types;
mod body;
mod client;

pub use body::{decode_base64url, strip_html};
pub use client::{GMAIL_API_BASE, GmailMailbox};
