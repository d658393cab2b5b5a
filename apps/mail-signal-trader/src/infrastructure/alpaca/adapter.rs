//! Alpaca broker adapter implementing BrokerPort.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::ports::{BrokerError, BrokerPort, OrderAck};
use crate::domain::order::OrderRequest;
use crate::domain::signal::Symbol;

use super::api_types::{
    AlpacaAccountResponse, AlpacaLatestQuoteResponse, AlpacaOrderRequest, AlpacaOrderResponse,
    AlpacaPositionResponse,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
///
/// Implements `BrokerPort` for the Alpaca Markets API.
#[derive(Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaBrokerAdapter {
    /// Create a new Alpaca broker adapter.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(config)?;
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn submit_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let alpaca_request = AlpacaOrderRequest::from(&request);

        tracing::debug!(
            client_order_id = %alpaca_request.client_order_id,
            symbol = %alpaca_request.symbol,
            side = %alpaca_request.side,
            qty = ?alpaca_request.qty,
            notional = ?alpaca_request.notional,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self
            .client
            .post("/v2/orders", &alpaca_request)
            .await
            .map_err(BrokerError::from)?;

        Ok(response.to_order_ack())
    }

    async fn get_buying_power(&self) -> Result<Decimal, BrokerError> {
        let account: AlpacaAccountResponse = self
            .client
            .get("/v2/account")
            .await
            .map_err(BrokerError::from)?;

        account
            .buying_power
            .parse()
            .map_err(|_| BrokerError::Unknown {
                message: "Failed to parse buying power".to_string(),
            })
    }

    async fn get_position(&self, symbol: &Symbol) -> Result<Option<Decimal>, BrokerError> {
        let result: Result<AlpacaPositionResponse, AlpacaError> = self
            .client
            .get(&format!("/v2/positions/{}", symbol.as_str()))
            .await;

        match result {
            Ok(position) => {
                let qty: Decimal = position.qty.parse().map_err(|_| BrokerError::Unknown {
                    message: format!("Failed to parse position quantity for {}", position.symbol),
                })?;
                Ok(Some(qty))
            }
            Err(AlpacaError::NotFound { .. }) => Ok(None),
            Err(e) => Err(BrokerError::from(e)),
        }
    }

    async fn get_latest_price(&self, symbol: &Symbol) -> Result<Decimal, BrokerError> {
        let response: AlpacaLatestQuoteResponse = self
            .client
            .data_get(&format!("/v2/stocks/{}/quotes/latest", symbol.as_str()))
            .await
            .map_err(BrokerError::from)?;

        response.quote.reference_price().ok_or_else(|| {
            AlpacaError::NoQuote {
                symbol: symbol.to_string(),
            }
            .into()
        })
    }
}
