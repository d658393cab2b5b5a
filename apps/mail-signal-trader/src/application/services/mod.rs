//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SignalLoop`: polls the mailbox and drives each message to an outcome
//! - `OrderDispatcher`: sizes and submits the order for a signal
//! - `CredentialCache`: keeps the mailbox access token fresh
//! - `LoopHealth`: counters and the periodic heartbeat

mod credentials;
mod dispatcher;
mod heartbeat;
mod signal_loop;

pub use credentials::CredentialCache;
pub use dispatcher::{
    DEFAULT_INVEST_PERCENTAGE, DispatchError, DispatchPolicy, MIN_NOTIONAL, OrderDispatcher,
};
pub use heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, LoopHealth};
pub use signal_loop::{CycleReport, LoopError, LoopSettings, SignalLoop};
