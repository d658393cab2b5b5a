//! Processed-Message Ledgers
//!
//! `SignalLedger` adapters:
//! - [`FileSignalLedger`]: JSON file, survives restarts
//! - [`InMemorySignalLedger`]: process lifetime only, for tests and dry runs

mod file;
mod memory;

pub use file::{FileSignalLedger, MAX_LEDGER_ENTRIES};
pub use memory::InMemorySignalLedger;
