//! Signal Parser
//!
//! Extracts a [`TradeSignal`] from the subject and body of an alert email.
//! The alert provider phrases fills as, for example:
//!
//! ```text
//! Robot AlphaTrend bought 125 AAPL shares at $190.10
//! Robot AlphaTrend sold to close 125 AAPL shares at $195.00
//! Robot AlphaTrend shorted 40 TSLA shares at $251.30
//! Robot AlphaTrend covered to close 40 TSLA shares at $240.00
//! ```
//!
//! The quantity in the email is the provider's own fill and is ignored;
//! order sizing happens in the dispatcher.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::{MessageId, SignalSide, Symbol, TradeSignal};

#[allow(clippy::expect_used)]
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(bought|sold to close|shorted|covered to close)\b")
        .expect("static marker pattern is valid")
});

#[allow(clippy::expect_used)]
static PRICE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bat\b").expect("static price pattern is valid"));

#[allow(clippy::expect_used)]
static TICKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9]{0,9}(\.[A-Z]{1,3})?$").expect("static ticker pattern is valid")
});

/// Text matched a signal marker but the ticker could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing followed the marker.
    #[error("signal marker '{marker}' is not followed by a ticker")]
    MissingTicker {
        /// Marker phrase that matched.
        marker: String,
    },

    /// The token in ticker position is not a valid symbol.
    #[error("signal marker '{marker}' is followed by malformed ticker '{token}'")]
    MalformedTicker {
        /// Marker phrase that matched.
        marker: String,
        /// Offending token.
        token: String,
    },
}

/// Stateless parser for the alert vocabulary.
#[derive(Debug, Clone, Default)]
pub struct SignalParser {
    robot_name: Option<String>,
}

impl SignalParser {
    /// Create a parser that accepts every alert.
    #[must_use]
    pub const fn new() -> Self {
        Self { robot_name: None }
    }

    /// Only accept alerts that mention `robot_name` (case-insensitive).
    #[must_use]
    pub fn with_robot_name(mut self, robot_name: impl Into<String>) -> Self {
        let name = robot_name.into();
        let name = name.trim();
        self.robot_name = (!name.is_empty()).then(|| name.to_lowercase());
        self
    }

    /// Parse a message.
    ///
    /// Returns `Ok(None)` when the text carries no signal.
    pub fn parse(
        &self,
        message_id: &MessageId,
        subject: &str,
        body: &str,
    ) -> Result<Option<TradeSignal>, ParseError> {
        let text = normalize(subject, body);

        if let Some(name) = &self.robot_name
            && !text.contains(name.as_str())
        {
            return Ok(None);
        }

        let Some(marker) = MARKER.find(&text) else {
            return Ok(None);
        };

        let rest = &text[marker.end()..];
        if !PRICE_WORD.is_match(rest) {
            return Ok(None);
        }

        let side = match marker.as_str() {
            "bought" => SignalSide::Buy,
            "sold to close" => SignalSide::Sell,
            "shorted" => SignalSide::Short,
            _ => SignalSide::Cover,
        };

        let symbol = extract_ticker(marker.as_str(), rest)?;

        Ok(Some(TradeSignal::new(side, symbol, message_id.clone())))
    }
}

/// Join subject and body into one lowercase line with single spaces.
fn normalize(subject: &str, body: &str) -> String {
    subject
        .split_whitespace()
        .chain(body.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The ticker follows the provider's fill quantity; the quantity is optional.
fn extract_ticker(marker: &str, rest: &str) -> Result<Symbol, ParseError> {
    let mut tokens = rest.split_whitespace();

    let first = tokens.next().ok_or_else(|| ParseError::MissingTicker {
        marker: marker.to_string(),
    })?;

    let candidate = if is_quantity(first) {
        tokens.next().ok_or_else(|| ParseError::MissingTicker {
            marker: marker.to_string(),
        })?
    } else {
        first
    };

    if candidate == "at" {
        return Err(ParseError::MissingTicker {
            marker: marker.to_string(),
        });
    }

    let ticker = candidate
        .trim_end_matches([',', ';', ':', '!', '?', '.', ')'])
        .to_uppercase();

    if TICKER.is_match(&ticker) {
        Ok(Symbol::new(ticker))
    } else {
        Err(ParseError::MalformedTicker {
            marker: marker.to_string(),
            token: candidate.to_string(),
        })
    }
}

fn is_quantity(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}
