//! Market orders built from trade signals.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::signal::Symbol;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How much to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSize {
    /// Dollar amount; the broker computes fractional shares.
    Notional(Decimal),
    /// Share count.
    Quantity(Decimal),
}

impl fmt::Display for OrderSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notional(amount) => write!(f, "${amount}"),
            Self::Quantity(qty) => write!(f, "{qty} shares"),
        }
    }
}

/// A market order, good for the day.
///
/// Built once per trade signal and submitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order id, unique per source message and side.
    pub client_order_id: String,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Notional or quantity.
    pub size: OrderSize,
}

impl OrderRequest {
    /// Market order for a dollar amount.
    #[must_use]
    pub const fn notional(
        client_order_id: String,
        symbol: Symbol,
        side: OrderSide,
        amount: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            size: OrderSize::Notional(amount),
        }
    }

    /// Market order for a share count.
    #[must_use]
    pub const fn quantity(
        client_order_id: String,
        symbol: Symbol,
        side: OrderSide,
        qty: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            size: OrderSize::Quantity(qty),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn size_display() {
        assert_eq!(OrderSize::Notional(dec!(950.00)).to_string(), "$950.00");
        assert_eq!(OrderSize::Quantity(dec!(12)).to_string(), "12 shares");
    }

    #[test]
    fn constructors_set_size_kind() {
        let buy = OrderRequest::notional("c1".into(), Symbol::new("XYZ"), OrderSide::Buy, dec!(10));
        assert!(matches!(buy.size, OrderSize::Notional(_)));

        let sell = OrderRequest::quantity("c2".into(), Symbol::new("XYZ"), OrderSide::Sell, dec!(3));
        assert!(matches!(sell.size, OrderSize::Quantity(_)));
    }
}
