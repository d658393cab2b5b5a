//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone)]
pub enum AlpacaError {
    /// HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Account lacks buying power for the order.
    #[error("Insufficient buying power: {0}")]
    InsufficientFunds(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Resource not found (no open position, unknown symbol).
    #[error("Not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// Latest quote had neither an ask nor a bid.
    #[error("No quote available for {symbol}")]
    NoQuote {
        /// Quoted symbol.
        symbol: String,
    },
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Network(msg) => Self::ConnectionError { message: msg },
            AlpacaError::MaxRetriesExceeded { attempts } => Self::ConnectionError {
                message: format!("Max retries exceeded after {attempts} attempts"),
            },
            AlpacaError::RateLimited { .. } => Self::RateLimited,
            AlpacaError::OrderRejected(msg) => Self::OrderRejected { reason: msg },
            AlpacaError::InsufficientFunds(_) => Self::InsufficientFunds,
            AlpacaError::AuthenticationFailed => Self::AuthenticationFailed,
            AlpacaError::Api { code, message } => Self::Unknown {
                message: format!("{code}: {message}"),
            },
            AlpacaError::NotFound { path } => Self::Unknown {
                message: format!("Not found: {path}"),
            },
            AlpacaError::Http(msg) | AlpacaError::JsonParse(msg) => Self::Unknown { message: msg },
            AlpacaError::NoQuote { symbol } => Self::Unknown {
                message: format!("No quote available for {symbol}"),
            },
        }
    }
}
