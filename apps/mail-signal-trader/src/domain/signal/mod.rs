//! Trading signals extracted from mailbox messages.

use std::fmt;

use serde::{Deserialize, Serialize};

mod parser;

pub use parser::{ParseError, SignalParser};

/// Mailbox-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new message id.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A ticker symbol, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new symbol.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Instruction carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSide {
    /// Open a long position.
    Buy,
    /// Close a long position.
    Sell,
    /// Open a short position.
    Short,
    /// Close a short position.
    Cover,
}

impl SignalSide {
    /// Whether the signal opens or closes a short position.
    #[must_use]
    pub const fn is_short_side(&self) -> bool {
        matches!(self, Self::Short | Self::Cover)
    }

    /// Lowercase label used in metrics and client order ids.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Short => "short",
            Self::Cover => "cover",
        }
    }
}

impl fmt::Display for SignalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Short => write!(f, "SHORT"),
            Self::Cover => write!(f, "COVER"),
        }
    }
}

/// A parsed trading instruction, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// What to do.
    pub side: SignalSide,
    /// Which instrument.
    pub symbol: Symbol,
    /// Message the signal was read from.
    pub message_id: MessageId,
}

impl TradeSignal {
    /// Create a new signal.
    #[must_use]
    pub const fn new(side: SignalSide, symbol: Symbol, message_id: MessageId) -> Self {
        Self {
            side,
            symbol,
            message_id,
        }
    }

    /// Broker client order id derived from the source message.
    ///
    /// Alpaca rejects a second order with the same client order id, so a
    /// message can never produce two accepted orders for the same side.
    #[must_use]
    pub fn client_order_id(&self) -> String {
        format!("mst-{}-{}", self.message_id, self.side.as_str())
    }
}
