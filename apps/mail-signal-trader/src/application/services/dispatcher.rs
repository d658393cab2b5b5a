//! Order Dispatcher
//!
//! Turns a [`TradeSignal`] into exactly one market order.
//!
//! | Signal | Broker lookups | Order |
//! |--------|----------------|-------|
//! | BUY    | buying power   | buy `buying_power × invest_percentage` notional |
//! | SELL   | position       | sell full long quantity |
//! | SHORT  | buying power, latest price | sell whole shares worth `buying_power × invest_percentage` |
//! | COVER  | position       | buy back full short quantity |
//!
//! SHORT and COVER require shorting to be enabled. With shorting enabled, a
//! SELL for a symbol with no long position opens a short instead of being
//! skipped.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::application::ports::{BrokerError, BrokerPort, OrderAck};
use crate::domain::order::{OrderRequest, OrderSide};
use crate::domain::signal::{SignalSide, Symbol, TradeSignal};

/// Smallest notional order the broker accepts.
pub const MIN_NOTIONAL: Decimal = dec!(1.00);

/// Default fraction of buying power committed per entry.
pub const DEFAULT_INVEST_PERCENTAGE: Decimal = dec!(0.95);

/// Sizing policy for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Fraction of buying power per entry, in `(0, 1]`.
    pub invest_percentage: Decimal,
    /// Whether short positions may be opened and covered.
    pub short_enabled: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            invest_percentage: DEFAULT_INVEST_PERCENTAGE,
            short_enabled: false,
        }
    }
}

/// Why a signal produced no order.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Not enough buying power for a minimum-size order, or the broker
    /// refused the order for lack of funds.
    #[error(
        "insufficient funds for {symbol}{}",
        .buying_power.map_or_else(String::new, |bp| format!(": buying power {bp}"))
    )]
    InsufficientFunds {
        /// Target symbol.
        symbol: Symbol,
        /// Buying power at the time of the check; `None` when the broker
        /// refused the order.
        buying_power: Option<Decimal>,
    },

    /// Nothing to close.
    #[error("no {side} position in {symbol} to close")]
    NoPosition {
        /// Target symbol.
        symbol: Symbol,
        /// Signal that required the position.
        side: SignalSide,
    },

    /// Short signal received while shorting is disabled.
    #[error("{side} signal for {symbol} ignored: shorting is disabled")]
    ShortingDisabled {
        /// Target symbol.
        symbol: Symbol,
        /// Signal side.
        side: SignalSide,
    },

    /// Broker lookup or submission failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl DispatchError {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::NoPosition { .. } => "no_position",
            Self::ShortingDisabled { .. } => "shorting_disabled",
            Self::Broker(_) => "broker_error",
        }
    }
}

/// Sizes and submits orders for trade signals.
pub struct OrderDispatcher<B: BrokerPort> {
    broker: Arc<B>,
    policy: DispatchPolicy,
}

impl<B: BrokerPort> OrderDispatcher<B> {
    /// Create a new dispatcher.
    pub const fn new(broker: Arc<B>, policy: DispatchPolicy) -> Self {
        Self { broker, policy }
    }

    /// The sizing policy in effect.
    pub const fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Build and submit the order for a signal.
    pub async fn dispatch(&self, signal: &TradeSignal) -> Result<OrderAck, DispatchError> {
        let request = self.build_order(signal).await?;

        tracing::info!(
            message_id = %signal.message_id,
            symbol = %request.symbol,
            side = %request.side,
            size = %request.size,
            client_order_id = %request.client_order_id,
            "Submitting market order"
        );

        let symbol = request.symbol.clone();
        let ack = match self.broker.submit_order(request).await {
            Ok(ack) => ack,
            Err(BrokerError::InsufficientFunds) => {
                return Err(DispatchError::InsufficientFunds {
                    symbol,
                    buying_power: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            message_id = %signal.message_id,
            broker_order_id = %ack.broker_order_id,
            status = %ack.status,
            "Order accepted by broker"
        );

        Ok(ack)
    }

    async fn build_order(&self, signal: &TradeSignal) -> Result<OrderRequest, DispatchError> {
        if signal.side.is_short_side() && !self.policy.short_enabled {
            return Err(DispatchError::ShortingDisabled {
                symbol: signal.symbol.clone(),
                side: signal.side,
            });
        }

        match signal.side {
            SignalSide::Buy => self.open_long(signal).await,
            SignalSide::Sell => self.close_long(signal).await,
            SignalSide::Short => self.open_short(signal).await,
            SignalSide::Cover => self.close_short(signal).await,
        }
    }

    async fn open_long(&self, signal: &TradeSignal) -> Result<OrderRequest, DispatchError> {
        let buying_power = self.broker.get_buying_power().await?;
        let notional = self.entry_budget(buying_power);

        if notional < MIN_NOTIONAL {
            return Err(DispatchError::InsufficientFunds {
                symbol: signal.symbol.clone(),
                buying_power: Some(buying_power),
            });
        }

        Ok(OrderRequest::notional(
            signal.client_order_id(),
            signal.symbol.clone(),
            OrderSide::Buy,
            notional,
        ))
    }

    async fn close_long(&self, signal: &TradeSignal) -> Result<OrderRequest, DispatchError> {
        let position = self
            .broker
            .get_position(&signal.symbol)
            .await?
            .unwrap_or(Decimal::ZERO);

        if position > Decimal::ZERO {
            return Ok(OrderRequest::quantity(
                signal.client_order_id(),
                signal.symbol.clone(),
                OrderSide::Sell,
                position,
            ));
        }

        if self.policy.short_enabled && position.is_zero() {
            tracing::info!(
                symbol = %signal.symbol,
                "No long position to sell, opening short"
            );
            return self.open_short(signal).await;
        }

        Err(DispatchError::NoPosition {
            symbol: signal.symbol.clone(),
            side: signal.side,
        })
    }

    async fn open_short(&self, signal: &TradeSignal) -> Result<OrderRequest, DispatchError> {
        let buying_power = self.broker.get_buying_power().await?;
        let budget = self.entry_budget(buying_power);
        let price = self.broker.get_latest_price(&signal.symbol).await?;

        // Short sales must be whole shares.
        let qty = if price > Decimal::ZERO {
            (budget / price).trunc()
        } else {
            Decimal::ZERO
        };

        if qty < Decimal::ONE {
            return Err(DispatchError::InsufficientFunds {
                symbol: signal.symbol.clone(),
                buying_power: Some(buying_power),
            });
        }

        Ok(OrderRequest::quantity(
            signal.client_order_id(),
            signal.symbol.clone(),
            OrderSide::Sell,
            qty,
        ))
    }

    async fn close_short(&self, signal: &TradeSignal) -> Result<OrderRequest, DispatchError> {
        let position = self
            .broker
            .get_position(&signal.symbol)
            .await?
            .unwrap_or(Decimal::ZERO);

        if position >= Decimal::ZERO {
            return Err(DispatchError::NoPosition {
                symbol: signal.symbol.clone(),
                side: signal.side,
            });
        }

        Ok(OrderRequest::quantity(
            signal.client_order_id(),
            signal.symbol.clone(),
            OrderSide::Buy,
            position.abs(),
        ))
    }

    /// Dollars to commit, truncated to cents.
    fn entry_budget(&self, buying_power: Decimal) -> Decimal {
        if buying_power <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (buying_power * self.policy.invest_percentage)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::order::OrderSize;
    use crate::domain::signal::MessageId;

    struct MockBroker {
        buying_power: Decimal,
        position: Option<Decimal>,
        price: Decimal,
        reject_with: Option<BrokerError>,
        submitted: Mutex<Vec<OrderRequest>>,
    }

    impl MockBroker {
        fn new(buying_power: Decimal, position: Option<Decimal>) -> Self {
            Self {
                buying_power,
                position,
                price: dec!(100),
                reject_with: None,
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submitted(&self) -> Vec<OrderRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerPort for MockBroker {
        async fn submit_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError> {
            if let Some(err) = &self.reject_with {
                return Err(err.clone());
            }
            let ack = OrderAck {
                broker_order_id: "broker-123".to_string(),
                client_order_id: request.client_order_id.clone(),
                status: "accepted".to_string(),
                filled_qty: Decimal::ZERO,
            };
            self.submitted.lock().unwrap().push(request);
            Ok(ack)
        }

        async fn get_buying_power(&self) -> Result<Decimal, BrokerError> {
            Ok(self.buying_power)
        }

        async fn get_position(&self, _symbol: &Symbol) -> Result<Option<Decimal>, BrokerError> {
            Ok(self.position)
        }

        async fn get_latest_price(&self, _symbol: &Symbol) -> Result<Decimal, BrokerError> {
            Ok(self.price)
        }
    }

    fn signal(side: SignalSide) -> TradeSignal {
        TradeSignal::new(side, Symbol::new("XYZ"), MessageId::new("msg-1"))
    }

    fn dispatcher(broker: &Arc<MockBroker>, short_enabled: bool) -> OrderDispatcher<MockBroker> {
        OrderDispatcher::new(
            Arc::clone(broker),
            DispatchPolicy {
                invest_percentage: dec!(0.95),
                short_enabled,
            },
        )
    }

    #[tokio::test]
    async fn buy_invests_percentage_of_buying_power() {
        let broker = Arc::new(MockBroker::new(dec!(1000), None));
        let ack = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Buy))
            .await
            .unwrap();

        assert_eq!(ack.client_order_id, "mst-msg-1-buy");
        let orders = broker.submitted();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].symbol.as_str(), "XYZ");
        assert_eq!(orders[0].size, OrderSize::Notional(dec!(950)));
    }

    #[tokio::test]
    async fn buy_notional_truncates_to_cents() {
        let broker = Arc::new(MockBroker::new(dec!(1234.5678), None));
        dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Buy))
            .await
            .unwrap();

        assert_eq!(broker.submitted()[0].size, OrderSize::Notional(dec!(1172.83)));
    }

    #[tokio::test]
    async fn buy_without_buying_power_is_rejected() {
        let broker = Arc::new(MockBroker::new(dec!(0.50), None));
        let err = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Buy))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::InsufficientFunds { .. }));
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_closes_full_position() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(dec!(12.5))));
        dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Sell))
            .await
            .unwrap();

        let orders = broker.submitted();
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].size, OrderSize::Quantity(dec!(12.5)));
    }

    #[tokio::test]
    async fn sell_without_position_is_skipped_when_shorting_disabled() {
        let broker = Arc::new(MockBroker::new(dec!(1000), None));
        let err = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Sell))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoPosition { .. }));
        assert_eq!(err.reason(), "no_position");
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_with_zero_quantity_position_is_skipped() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(Decimal::ZERO)));
        let err = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Sell))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoPosition { .. }));
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_without_position_opens_short_when_enabled() {
        let broker = Arc::new(MockBroker::new(dec!(1000), None));
        dispatcher(&broker, true)
            .dispatch(&signal(SignalSide::Sell))
            .await
            .unwrap();

        let orders = broker.submitted();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
        // 950 / 100 = 9.5 -> 9 whole shares
        assert_eq!(orders[0].size, OrderSize::Quantity(dec!(9)));
    }

    #[tokio::test]
    async fn sell_while_short_is_not_doubled_down() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(dec!(-5))));
        let err = dispatcher(&broker, true)
            .dispatch(&signal(SignalSide::Sell))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoPosition { .. }));
    }

    #[tokio::test]
    async fn short_signals_require_shorting() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(dec!(-5))));
        let d = dispatcher(&broker, false);

        for side in [SignalSide::Short, SignalSide::Cover] {
            let err = d.dispatch(&signal(side)).await.unwrap_err();
            assert!(matches!(err, DispatchError::ShortingDisabled { .. }));
        }
        assert!(broker.submitted().is_empty());
    }

    #[tokio::test]
    async fn short_too_expensive_is_insufficient_funds() {
        let mut broker = MockBroker::new(dec!(50), None);
        broker.price = dec!(100);
        let broker = Arc::new(broker);

        let err = dispatcher(&broker, true)
            .dispatch(&signal(SignalSide::Short))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn cover_buys_back_short_quantity() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(dec!(-7))));
        dispatcher(&broker, true)
            .dispatch(&signal(SignalSide::Cover))
            .await
            .unwrap();

        let orders = broker.submitted();
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].size, OrderSize::Quantity(dec!(7)));
    }

    #[tokio::test]
    async fn cover_without_short_is_no_position() {
        let broker = Arc::new(MockBroker::new(dec!(1000), Some(dec!(3))));
        let err = dispatcher(&broker, true)
            .dispatch(&signal(SignalSide::Cover))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoPosition { .. }));
    }

    #[tokio::test]
    async fn broker_rejection_is_reported() {
        let mut broker = MockBroker::new(dec!(1000), None);
        broker.reject_with = Some(BrokerError::OrderRejected {
            reason: "Test rejection".to_string(),
        });
        let broker = Arc::new(broker);

        let err = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Buy))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Broker(BrokerError::OrderRejected { .. })
        ));
    }

    #[tokio::test]
    async fn broker_insufficient_buying_power_is_a_rejected_trade() {
        let mut broker = MockBroker::new(dec!(1000), None);
        broker.reject_with = Some(BrokerError::InsufficientFunds);
        let broker = Arc::new(broker);

        let err = dispatcher(&broker, false)
            .dispatch(&signal(SignalSide::Buy))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::InsufficientFunds {
                buying_power: None,
                ..
            }
        ));
        assert_eq!(err.reason(), "insufficient_funds");
        assert_eq!(err.to_string(), "insufficient funds for XYZ");
    }
}
