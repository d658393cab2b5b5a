#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::option_if_let_else,
        clippy::panic
    )
)]

//! Mail Signal Trader - Gmail Alerts to Alpaca Orders
//!
//! Polls a Gmail label for trading-alert emails, extracts BUY/SELL
//! (and optionally SHORT/COVER) signals, and submits market orders to
//! Alpaca.
//!
//! # Layers (inside to outside)
//!
//! - **Domain**: Signal parsing and order types
//!   - `signal`: `TradeSignal`, `SignalParser`
//!   - `order`: `OrderRequest`, notional vs. share sizing
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: mailbox, credentials, broker, ledger, notifier
//!   - `services`: poll loop, order dispatcher, credential cache, heartbeat
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gmail` / `google_auth`: Gmail REST API and OAuth2
//!   - `alpaca`: Alpaca trading and market data REST API
//!   - `ledger`: processed-message store
//!   - `notify`: Prowl push notifications
//!   - `config`, `telemetry`, `metrics`: ambient concerns
//!
//! # Data Flow
//!
//! ```text
//! Gmail label ──► SignalLoop ──► SignalParser ──► OrderDispatcher ──► Alpaca
//!                     │                                 │
//!                     ├── SignalLedger (before order)   └── Notifier
//!                     └── mark read
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Signals and orders with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::order::{OrderRequest, OrderSide, OrderSize};
pub use domain::signal::{
    MessageId, ParseError, SignalParser, SignalSide, Symbol, TradeSignal,
};

// Ports
pub use application::ports::{
    AuthError, BrokerError, BrokerPort, Credential, CredentialProvider, LedgerError,
    MailMessage, MailboxError, MailboxPort, Notification, NotifierPort, OrderAck, Priority,
    SignalLedger,
};

// Services
pub use application::services::{
    CredentialCache, CycleReport, DispatchError, DispatchPolicy, LoopError, LoopHealth,
    LoopSettings, OrderDispatcher, SignalLoop,
};

// Infrastructure config
pub use infrastructure::config::{BotConfig, ConfigError};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
