//! Prometheus Metrics Module
//!
//! Counters and gauges for the poll loop.
//!
//! # Metrics
//!
//! - `mail_trader_cycles_total`: completed poll cycles
//! - `mail_trader_poll_failures_total`: cycles abandoned on mailbox errors
//! - `mail_trader_signals_total{side}`: parsed signals
//! - `mail_trader_orders_total{outcome}`: dispatch outcomes
//! - `mail_trader_last_signal_timestamp`: unix time of the last signal
//!
//! Without a recorder installed every call is a no-op, which is what tests
//! rely on.

mod server;

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub use server::{MetricsServer, MetricsServerError};

use crate::domain::signal::SignalSide;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!("mail_trader_cycles_total", "Completed mailbox poll cycles");
    describe_counter!(
        "mail_trader_poll_failures_total",
        "Poll cycles abandoned because the mailbox was unavailable"
    );
    describe_counter!("mail_trader_signals_total", "Trade signals parsed by side");
    describe_counter!(
        "mail_trader_orders_total",
        "Dispatch outcomes (submitted or rejection reason)"
    );
    describe_gauge!(
        "mail_trader_last_signal_timestamp",
        "Unix timestamp of the last parsed signal"
    );
}

// =============================================================================
// Recording Helpers
// =============================================================================

/// Record a completed cycle.
pub fn record_cycle() {
    counter!("mail_trader_cycles_total").increment(1);
}

/// Record an abandoned cycle.
pub fn record_poll_failure() {
    counter!("mail_trader_poll_failures_total").increment(1);
}

/// Record a parsed signal.
#[allow(clippy::cast_precision_loss)]
pub fn record_signal(side: SignalSide) {
    counter!("mail_trader_signals_total", "side" => side.as_str()).increment(1);
    gauge!("mail_trader_last_signal_timestamp").set(chrono::Utc::now().timestamp() as f64);
}

/// Record a dispatch outcome (`submitted` or a rejection reason).
pub fn record_order(outcome: &'static str) {
    counter!("mail_trader_orders_total", "outcome" => outcome).increment(1);
}
