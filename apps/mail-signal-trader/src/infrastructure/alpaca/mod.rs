//! Alpaca Markets Broker Adapter
//!
//! Implementation of `BrokerPort` for the Alpaca REST API with:
//! - Notional and quantity market orders (time in force `day`)
//! - Account buying power and signed position lookups
//! - Latest quote lookup on the market data API
//! - Retry with exponential backoff for 408/429/5xx

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig};
pub use error::AlpacaError;
