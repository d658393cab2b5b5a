//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format. Alpaca encodes
//! decimal amounts as JSON strings on the trading API and as numbers on the
//! market data API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::OrderAck;
use crate::domain::order::{OrderRequest, OrderSide, OrderSize};

// ============================================================================
// Order Request Types
// ============================================================================

/// Order request for Alpaca API.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Stock symbol.
    pub symbol: String,
    /// Quantity (shares).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<String>,
    /// Notional value (dollars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notional: Option<String>,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Client order ID.
    pub client_order_id: String,
}

impl From<&OrderRequest> for AlpacaOrderRequest {
    fn from(request: &OrderRequest) -> Self {
        let side = match request.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };

        let (qty, notional) = match request.size {
            OrderSize::Quantity(qty) => (Some(qty.normalize().to_string()), None),
            OrderSize::Notional(dollars) => (None, Some(format!("{dollars:.2}"))),
        };

        Self {
            symbol: request.symbol.as_str().to_string(),
            qty,
            notional,
            side: side.to_string(),
            order_type: "market".to_string(),
            time_in_force: "day".to_string(),
            client_order_id: request.client_order_id.clone(),
        }
    }
}

// ============================================================================
// Order Response Types
// ============================================================================

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Client order ID.
    pub client_order_id: String,
    /// Filled quantity (as string).
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Order status.
    pub status: String,
}

impl AlpacaOrderResponse {
    /// Convert to `OrderAck`.
    #[must_use]
    pub fn to_order_ack(&self) -> OrderAck {
        OrderAck {
            broker_order_id: self.id.clone(),
            client_order_id: self.client_order_id.clone(),
            status: self.status.clone(),
            filled_qty: self
                .filled_qty
                .as_deref()
                .and_then(|q| q.parse().ok())
                .unwrap_or(Decimal::ZERO),
        }
    }
}

// ============================================================================
// Account Types
// ============================================================================

/// Account response from Alpaca API (fields the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Buying power.
    pub buying_power: String,
}

// ============================================================================
// Position Types
// ============================================================================

/// Position response from Alpaca API (fields the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// Signed quantity; negative for short positions.
    pub qty: String,
}

// ============================================================================
// Market Data Types
// ============================================================================

/// `GET /v2/stocks/{symbol}/quotes/latest` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaLatestQuoteResponse {
    /// The quote.
    pub quote: AlpacaQuote,
}

/// A single NBBO quote.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaQuote {
    /// Ask price.
    #[serde(rename = "ap", default)]
    pub ask_price: f64,
    /// Bid price.
    #[serde(rename = "bp", default)]
    pub bid_price: f64,
}

impl AlpacaQuote {
    /// Ask price, or the bid when no ask is posted.
    #[must_use]
    pub fn reference_price(&self) -> Option<Decimal> {
        [self.ask_price, self.bid_price]
            .into_iter()
            .filter(|p| p.is_finite() && *p > 0.0)
            .find_map(|p| Decimal::try_from(p).ok())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Numeric error code.
    #[serde(default)]
    pub code: Option<u64>,
    /// Error message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::signal::Symbol;

    #[test]
    fn notional_order_is_formatted_to_cents() {
        let request = OrderRequest::notional(
            "mst-1-buy".to_string(),
            Symbol::new("AAPL"),
            OrderSide::Buy,
            dec!(950),
        );

        let alpaca = AlpacaOrderRequest::from(&request);

        assert_eq!(alpaca.notional.as_deref(), Some("950.00"));
        assert!(alpaca.qty.is_none());
        assert_eq!(alpaca.side, "buy");
        assert_eq!(alpaca.order_type, "market");
        assert_eq!(alpaca.time_in_force, "day");
        assert_eq!(alpaca.client_order_id, "mst-1-buy");
    }

    #[test]
    fn quantity_order_serializes_without_notional() {
        let request = OrderRequest::quantity(
            "mst-1-sell".to_string(),
            Symbol::new("MSFT"),
            OrderSide::Sell,
            dec!(12.500),
        );

        let json = serde_json::to_value(AlpacaOrderRequest::from(&request)).unwrap();

        assert_eq!(json["qty"], "12.5");
        assert_eq!(json["type"], "market");
        assert!(json.get("notional").is_none());
    }

    #[test]
    fn order_response_to_ack() {
        let response: AlpacaOrderResponse = serde_json::from_str(
            r#"{"id":"b-1","client_order_id":"mst-1-buy","status":"accepted","filled_qty":"0"}"#,
        )
        .unwrap();

        let ack = response.to_order_ack();
        assert_eq!(ack.broker_order_id, "b-1");
        assert_eq!(ack.status, "accepted");
        assert_eq!(ack.filled_qty, Decimal::ZERO);
    }

    #[test]
    fn quote_prefers_ask_then_bid() {
        let quote = AlpacaQuote {
            ask_price: 101.5,
            bid_price: 101.0,
        };
        assert_eq!(quote.reference_price(), Some(dec!(101.5)));

        let quote = AlpacaQuote {
            ask_price: 0.0,
            bid_price: 99.25,
        };
        assert_eq!(quote.reference_price(), Some(dec!(99.25)));

        let quote = AlpacaQuote {
            ask_price: 0.0,
            bid_price: 0.0,
        };
        assert_eq!(quote.reference_price(), None);
    }
}
