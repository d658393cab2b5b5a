//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Alpaca REST adapter (orders, account, positions, quotes).
pub mod alpaca;

/// Crash-safe file replacement shared by the file-backed stores.
pub(crate) mod atomic_file;

/// Environment configuration.
pub mod config;

/// Gmail REST adapter.
pub mod gmail;

/// Google OAuth2 token store and consent flow.
pub mod google_auth;

/// Processed-message ledgers.
pub mod ledger;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Push notification adapters.
pub mod notify;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
