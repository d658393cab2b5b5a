use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::{LedgerError, SignalLedger};
use crate::domain::signal::MessageId;

/// Ledger held in memory.
#[derive(Debug, Default)]
pub struct InMemorySignalLedger {
    ids: RwLock<HashSet<MessageId>>,
}

impl InMemorySignalLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded messages.
    pub async fn len(&self) -> usize {
        self.ids.read().await.len()
    }

    /// Whether nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.ids.read().await.is_empty()
    }
}

#[async_trait]
impl SignalLedger for InMemorySignalLedger {
    async fn contains(&self, message_id: &MessageId) -> Result<bool, LedgerError> {
        Ok(self.ids.read().await.contains(message_id))
    }

    async fn record(&self, message_id: &MessageId) -> Result<(), LedgerError> {
        self.ids.write().await.insert(message_id.clone());
        Ok(())
    }

    async fn release(&self, message_id: &MessageId) -> Result<(), LedgerError> {
        self.ids.write().await.remove(message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_then_release() {
        let ledger = InMemorySignalLedger::new();
        let id = MessageId::new("m1");

        assert!(!ledger.contains(&id).await.unwrap());
        ledger.record(&id).await.unwrap();
        assert!(ledger.contains(&id).await.unwrap());
        assert_eq!(ledger.len().await, 1);

        ledger.release(&id).await.unwrap();
        assert!(ledger.is_empty().await);
    }
}
