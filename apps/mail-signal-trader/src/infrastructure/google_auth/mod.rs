//! Google OAuth2 Credential Provider
//!
//! Implements `CredentialProvider` for the Gmail account:
//! - [`GoogleTokenStore`]: token file persistence and refresh
//! - [`ClientSecrets`]: the downloaded OAuth client configuration
//! - [`LoopbackReceiver`]: redirect listener for the browser consent flow

mod client_secrets;
mod consent;
mod token_endpoint;
mod token_store;

pub use client_secrets::ClientSecrets;
pub use consent::{CONSENT_TIMEOUT, GMAIL_MODIFY_SCOPE, LoopbackReceiver, authorization_url};
pub use token_store::GoogleTokenStore;
