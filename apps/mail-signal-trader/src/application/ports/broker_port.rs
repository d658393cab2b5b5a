//! Broker Port (Driven Port)
//!
//! Interface for interacting with a brokerage for order execution.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderRequest;
use crate::domain::signal::Symbol;

/// Acknowledgment from broker after order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order ID.
    pub broker_order_id: String,
    /// Client order ID echoed back.
    pub client_order_id: String,
    /// Broker status string (`new`, `accepted`, `filled`, ...).
    pub status: String,
    /// Filled quantity (if any).
    pub filled_qty: Decimal,
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Insufficient funds.
    #[error("Insufficient buying power")]
    InsufficientFunds,

    /// Broker credentials were refused.
    #[error("Broker authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether the same request may succeed if retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError { .. } | Self::RateLimited)
    }
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Submit a market order.
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError>;

    /// Get account buying power.
    async fn get_buying_power(&self) -> Result<Decimal, BrokerError>;

    /// Get the signed position quantity for a symbol (negative when short).
    ///
    /// Returns `None` when no position is open.
    async fn get_position(&self, symbol: &Symbol) -> Result<Option<Decimal>, BrokerError>;

    /// Latest tradable price for a symbol.
    async fn get_latest_price(&self, symbol: &Symbol) -> Result<Decimal, BrokerError>;
}
