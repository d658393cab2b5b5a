//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the mailbox, the broker and
//! the notification channels.

/// Port interfaces for external systems (mailbox, broker, ledger, etc.).
pub mod ports;

/// Application services: dispatching, the poll loop, credential caching.
pub mod services;
