//! Domain Layer - Signals and orders.
//!
//! Pure types and parsing logic with no I/O.

/// Trade signals and the alert-text parser.
pub mod signal;

/// Market order requests.
pub mod order;
