//! Loop health tracking and the periodic heartbeat log line.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3600);

/// Counters describing the poll loop since startup.
#[derive(Debug, Clone)]
pub struct LoopHealth {
    started_at: DateTime<Utc>,
    cycles_completed: u64,
    failed_cycles: u64,
    signals_detected: u64,
    orders_submitted: u64,
    trades_rejected: u64,
    last_signal_at: Option<DateTime<Utc>>,
    interval: Duration,
    last_heartbeat: Instant,
}

impl LoopHealth {
    /// Start tracking; the first heartbeat is due one interval from now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            started_at: Utc::now(),
            cycles_completed: 0,
            failed_cycles: 0,
            signals_detected: 0,
            orders_submitted: 0,
            trades_rejected: 0,
            last_signal_at: None,
            interval,
            last_heartbeat: now,
        }
    }

    /// A poll cycle ran to completion.
    pub const fn record_cycle(&mut self) {
        self.cycles_completed += 1;
    }

    /// A poll cycle was abandoned after a mailbox error.
    pub const fn record_failed_cycle(&mut self) {
        self.failed_cycles += 1;
    }

    /// A signal was parsed.
    pub fn record_signal(&mut self) {
        self.signals_detected += 1;
        self.last_signal_at = Some(Utc::now());
    }

    /// The broker accepted an order.
    pub const fn record_order(&mut self) {
        self.orders_submitted += 1;
    }

    /// A signal produced no order.
    pub const fn record_rejection(&mut self) {
        self.trades_rejected += 1;
    }

    /// Completed cycles.
    #[must_use]
    pub const fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Abandoned cycles.
    #[must_use]
    pub const fn failed_cycles(&self) -> u64 {
        self.failed_cycles
    }

    /// Signals parsed.
    #[must_use]
    pub const fn signals_detected(&self) -> u64 {
        self.signals_detected
    }

    /// Orders accepted.
    #[must_use]
    pub const fn orders_submitted(&self) -> u64 {
        self.orders_submitted
    }

    /// Signals without an order.
    #[must_use]
    pub const fn trades_rejected(&self) -> u64 {
        self.trades_rejected
    }

    /// When the last signal was parsed.
    #[must_use]
    pub const fn last_signal_at(&self) -> Option<DateTime<Utc>> {
        self.last_signal_at
    }

    /// Emit the heartbeat if an interval has elapsed. Returns whether it did.
    pub fn maybe_emit(&mut self) -> bool {
        self.maybe_emit_at(Instant::now())
    }

    fn maybe_emit_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_heartbeat) < self.interval {
            return false;
        }
        self.last_heartbeat = now;

        let last_signal = self
            .last_signal_at
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        let uptime_secs = (Utc::now() - self.started_at).num_seconds();

        tracing::info!(
            uptime_secs,
            cycles_completed = self.cycles_completed,
            failed_cycles = self.failed_cycles,
            signals_detected = self.signals_detected,
            orders_submitted = self.orders_submitted,
            trades_rejected = self.trades_rejected,
            last_signal = %last_signal,
            "Heartbeat"
        );
        true
    }
}
