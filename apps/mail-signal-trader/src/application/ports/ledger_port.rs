//! Signal Ledger Port (Driven Port)
//!
//! Durable record of messages that already reached the dispatcher. The loop
//! records a message before submitting its order, so a crash between order
//! submission and mark-read cannot cause a second order after restart.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::signal::MessageId;

/// Ledger error.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The backing store could not be read or written.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Port for the processed-message ledger.
#[async_trait]
pub trait SignalLedger: Send + Sync {
    /// Whether the message was already dispatched.
    async fn contains(&self, message_id: &MessageId) -> Result<bool, LedgerError>;

    /// Record the message as dispatched. Must be durable when it returns.
    async fn record(&self, message_id: &MessageId) -> Result<(), LedgerError>;

    /// Undo [`record`](Self::record) after a dispatch that may be retried.
    async fn release(&self, message_id: &MessageId) -> Result<(), LedgerError>;
}
