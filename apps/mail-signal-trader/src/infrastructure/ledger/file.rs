use std::collections::{HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::{LedgerError, SignalLedger};
use crate::domain::signal::MessageId;
use crate::infrastructure::atomic_file::write_atomic;

/// Most recent ids kept on disk. Older ids fall off; by then the freshness
/// window has long excluded their messages.
pub const MAX_LEDGER_ENTRIES: usize = 10_000;

#[derive(Debug, Default)]
struct Entries {
    order: VecDeque<MessageId>,
    index: HashSet<MessageId>,
}

impl Entries {
    fn from_ids(ids: Vec<MessageId>, capacity: usize) -> Self {
        let mut entries = Self::default();
        for id in ids {
            entries.insert(id);
        }
        entries.trim(capacity);
        entries
    }

    fn insert(&mut self, id: MessageId) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    fn remove(&mut self, id: &MessageId) -> bool {
        if !self.index.remove(id) {
            return false;
        }
        self.order.retain(|existing| existing != id);
        true
    }

    fn trim(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
            }
        }
    }

    fn to_json(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec_pretty(&self.order).map_err(|e| LedgerError::Storage(e.to_string()))
    }
}

/// Ledger persisted as a JSON array of message ids, oldest first.
///
/// Every change rewrites the file atomically before returning.
#[derive(Debug)]
pub struct FileSignalLedger {
    path: PathBuf,
    capacity: usize,
    entries: Mutex<Entries>,
}

impl FileSignalLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        Self::open_with_capacity(path, MAX_LEDGER_ENTRIES).await
    }

    /// Load with a custom retention bound.
    pub async fn open_with_capacity(
        path: impl Into<PathBuf>,
        capacity: usize,
    ) -> Result<Self, LedgerError> {
        let path = path.into();
        let ids = read_ids(&path).await?;
        let entries = Entries::from_ids(ids, capacity);

        tracing::info!(
            path = %path.display(),
            entries = entries.order.len(),
            "Processed-message ledger loaded"
        );

        Ok(Self {
            path,
            capacity,
            entries: Mutex::new(entries),
        })
    }

    /// Ledger file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of recorded messages.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.order.len()
    }

    /// Whether nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.order.is_empty()
    }

    async fn persist(&self, entries: &Entries) -> Result<(), LedgerError> {
        let json = entries.to_json()?;
        write_atomic(&self.path, &json)
            .await
            .map_err(|e| LedgerError::Storage(format!("{}: {e}", self.path.display())))
    }
}

async fn read_ids(path: &Path) -> Result<Vec<MessageId>, LedgerError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Storage(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(LedgerError::Storage(format!("{}: {e}", path.display()))),
    }
}

#[async_trait]
impl SignalLedger for FileSignalLedger {
    async fn contains(&self, message_id: &MessageId) -> Result<bool, LedgerError> {
        Ok(self.entries.lock().await.index.contains(message_id))
    }

    async fn record(&self, message_id: &MessageId) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().await;
        if !entries.insert(message_id.clone()) {
            return Ok(());
        }

        let mut evicted = Vec::new();
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.index.remove(&oldest);
                evicted.push(oldest);
            }
        }

        if let Err(err) = self.persist(&entries).await {
            entries.remove(message_id);
            for id in evicted.into_iter().rev() {
                entries.index.insert(id.clone());
                entries.order.push_front(id);
            }
            return Err(err);
        }
        Ok(())
    }

    async fn release(&self, message_id: &MessageId) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().await;
        if !entries.remove(message_id) {
            return Ok(());
        }
        self.persist(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> MessageId {
        MessageId::new(value)
    }

    #[tokio::test]
    async fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileSignalLedger::open(dir.path().join("ledger.json"))
            .await
            .unwrap();

        assert!(ledger.is_empty().await);
        assert!(!ledger.contains(&id("m1")).await.unwrap());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = FileSignalLedger::open(&path).await.unwrap();
        ledger.record(&id("m1")).await.unwrap();
        ledger.record(&id("m2")).await.unwrap();
        drop(ledger);

        let reopened = FileSignalLedger::open(&path).await.unwrap();
        assert!(reopened.contains(&id("m1")).await.unwrap());
        assert!(reopened.contains(&id("m2")).await.unwrap());

        let on_disk: Vec<String> =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(on_disk, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn release_removes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = FileSignalLedger::open(&path).await.unwrap();
        ledger.record(&id("m1")).await.unwrap();
        ledger.release(&id("m1")).await.unwrap();

        let reopened = FileSignalLedger::open(&path).await.unwrap();
        assert!(!reopened.contains(&id("m1")).await.unwrap());
    }

    #[tokio::test]
    async fn oldest_ids_are_evicted_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileSignalLedger::open_with_capacity(dir.path().join("ledger.json"), 2)
            .await
            .unwrap();

        for value in ["m1", "m2", "m3"] {
            ledger.record(&id(value)).await.unwrap();
        }

        assert_eq!(ledger.len().await, 2);
        assert!(!ledger.contains(&id("m1")).await.unwrap());
        assert!(ledger.contains(&id("m3")).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_record_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileSignalLedger::open(dir.path().join("ledger.json"))
            .await
            .unwrap();

        ledger.record(&id("m1")).await.unwrap();
        ledger.record(&id("m1")).await.unwrap();
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = FileSignalLedger::open(&path).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // The ledger path is a directory, so the rename fails.
        let path = dir.path().join("ledger");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let ledger = FileSignalLedger {
            path,
            capacity: MAX_LEDGER_ENTRIES,
            entries: Mutex::new(Entries::default()),
        };

        assert!(ledger.record(&id("m1")).await.is_err());
        assert!(!ledger.contains(&id("m1")).await.unwrap());
    }
}
