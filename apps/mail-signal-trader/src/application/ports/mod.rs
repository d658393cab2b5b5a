//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `MailboxPort`: signal mailbox (Gmail)
//! - `CredentialProvider`: OAuth2 credential for the mailbox
//! - `BrokerPort`: order execution (Alpaca)
//! - `SignalLedger`: processed-message record
//! - `NotifierPort`: push notifications

mod broker_port;
mod credential_port;
mod ledger_port;
mod mailbox_port;
mod notifier_port;

pub use broker_port::{BrokerError, BrokerPort, OrderAck};
pub use credential_port::{AuthError, Credential, CredentialProvider, EXPIRY_SKEW};
pub use ledger_port::{LedgerError, SignalLedger};
pub use mailbox_port::{MailMessage, MailboxError, MailboxPort};
pub use notifier_port::{Notification, NotifierPort, Priority};
