//! Signal Loop
//!
//! The polling state machine: fetch unread mail, parse, dispatch, mark read,
//! sleep. One cycle runs at a time.
//!
//! # Message outcomes
//!
//! | Situation | Order | Marked read |
//! |-----------|-------|-------------|
//! | already in the ledger | no | yes |
//! | older than the freshness window | no | yes |
//! | no signal / parse error | no | yes |
//! | ledger write failed | no | no |
//! | order accepted or rejected | yes / no | yes |
//! | transient broker failure | no | no (retried next poll) |
//!
//! Only an authentication failure ends the loop. An unreachable token
//! endpoint counts as a mailbox outage and is retried next cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::dispatcher::{DispatchError, OrderDispatcher};
use super::heartbeat::LoopHealth;
use crate::application::ports::{
    AuthError, BrokerPort, MailMessage, MailboxError, MailboxPort, Notification, NotifierPort,
    SignalLedger,
};
use crate::domain::signal::{MessageId, SignalParser, TradeSignal};
use crate::infrastructure::metrics;

/// Loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Mailbox label to poll.
    pub label: String,
    /// Messages fetched per poll.
    pub max_results: u32,
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Unread messages older than this are skipped. `None` disables the check.
    pub max_message_age: Option<Duration>,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            label: "Tickeron".to_string(),
            max_results: 10,
            poll_interval: Duration::from_millis(1000),
            max_message_age: Some(Duration::from_secs(120)),
            heartbeat_interval: super::heartbeat::DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Unrecoverable loop failure.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    /// Mailbox credentials are unusable.
    #[error("unrecoverable authentication failure: {0}")]
    Auth(#[from] AuthError),
}

/// What a single poll did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Messages returned by the mailbox.
    pub messages_seen: usize,
    /// Signals parsed.
    pub signals: usize,
    /// Orders the broker accepted.
    pub orders_submitted: usize,
    /// Signals that produced no order.
    pub rejected: usize,
    /// Messages with a marker but an unusable ticker.
    pub parse_errors: usize,
    /// Messages skipped (ledger hit, stale, or retry deferred).
    pub skipped: usize,
    /// Set when the mailbox could not be read this cycle.
    pub mailbox_error: Option<MailboxError>,
}

enum Disposition {
    MarkRead,
    LeaveUnread,
}

/// Polls the mailbox and dispatches signals until shutdown.
pub struct SignalLoop<M, B, L, N>
where
    M: MailboxPort,
    B: BrokerPort,
    L: SignalLedger,
    N: NotifierPort,
{
    mailbox: Arc<M>,
    dispatcher: OrderDispatcher<B>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    parser: SignalParser,
    settings: LoopSettings,
    health: LoopHealth,
    mailbox_degraded: bool,
}

impl<M, B, L, N> SignalLoop<M, B, L, N>
where
    M: MailboxPort,
    B: BrokerPort,
    L: SignalLedger,
    N: NotifierPort,
{
    /// Create a new loop.
    pub fn new(
        mailbox: Arc<M>,
        dispatcher: OrderDispatcher<B>,
        ledger: Arc<L>,
        notifier: Arc<N>,
        parser: SignalParser,
        settings: LoopSettings,
    ) -> Self {
        let health = LoopHealth::new(settings.heartbeat_interval);
        Self {
            mailbox,
            dispatcher,
            ledger,
            notifier,
            parser,
            settings,
            health,
            mailbox_degraded: false,
        }
    }

    /// Counters since startup.
    pub const fn health(&self) -> &LoopHealth {
        &self.health
    }

    /// Run cycles until `shutdown` fires or authentication fails.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), LoopError> {
        tracing::info!(
            label = %self.settings.label,
            poll_interval_ms = self.settings.poll_interval.as_millis(),
            short_enabled = self.dispatcher.policy().short_enabled,
            "Signal loop started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.poll_once().await?;
            self.health.maybe_emit();

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        tracing::info!(
            cycles_completed = self.health.cycles_completed(),
            orders_submitted = self.health.orders_submitted(),
            "Signal loop stopped"
        );
        Ok(())
    }

    /// Run a single cycle.
    pub async fn poll_once(&mut self) -> Result<CycleReport, LoopError> {
        let mut report = CycleReport::default();

        let mut messages = match self
            .mailbox
            .fetch_unread(&self.settings.label, self.settings.max_results)
            .await
        {
            Ok(messages) => messages,
            Err(MailboxError::Auth(err)) if !err.is_transient() => {
                return Err(self.fatal(err).await);
            }
            Err(err) => {
                self.record_mailbox_failure(&err).await;
                report.mailbox_error = Some(err);
                return Ok(report);
            }
        };

        if self.mailbox_degraded {
            self.mailbox_degraded = false;
            tracing::info!(label = %self.settings.label, "Mailbox reachable again");
        }

        // Oldest first.
        messages.reverse();
        report.messages_seen = messages.len();

        for message in &messages {
            let disposition = self.process(message, &mut report).await;
            if matches!(disposition, Disposition::MarkRead) {
                self.mark_read(&message.id).await?;
            }
        }

        self.health.record_cycle();
        metrics::record_cycle();
        Ok(report)
    }

    async fn process(&mut self, message: &MailMessage, report: &mut CycleReport) -> Disposition {
        match self.ledger.contains(&message.id).await {
            Ok(true) => {
                tracing::debug!(message_id = %message.id, "Message already dispatched");
                report.skipped += 1;
                return Disposition::MarkRead;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(message_id = %message.id, error = %err, "Ledger lookup failed");
                report.skipped += 1;
                return Disposition::LeaveUnread;
            }
        }

        if self.is_stale(message) {
            tracing::warn!(
                message_id = %message.id,
                received_at = %message.received_at,
                "Skipping stale message"
            );
            report.skipped += 1;
            return Disposition::MarkRead;
        }

        let signal = match self
            .parser
            .parse(&message.id, &message.subject, &message.body)
        {
            Ok(Some(signal)) => signal,
            Ok(None) => {
                tracing::debug!(message_id = %message.id, "No signal in message");
                return Disposition::MarkRead;
            }
            Err(err) => {
                tracing::warn!(
                    message_id = %message.id,
                    subject = %message.subject,
                    error = %err,
                    "Unparseable signal"
                );
                report.parse_errors += 1;
                return Disposition::MarkRead;
            }
        };

        tracing::info!(
            message_id = %signal.message_id,
            side = %signal.side,
            symbol = %signal.symbol,
            "Signal detected"
        );
        report.signals += 1;
        self.health.record_signal();
        metrics::record_signal(signal.side);

        if let Err(err) = self.ledger.record(&signal.message_id).await {
            tracing::error!(
                message_id = %signal.message_id,
                error = %err,
                "Could not record message, dispatch deferred"
            );
            report.skipped += 1;
            return Disposition::LeaveUnread;
        }

        self.dispatch(&signal, report).await
    }

    async fn dispatch(&mut self, signal: &TradeSignal, report: &mut CycleReport) -> Disposition {
        match self.dispatcher.dispatch(signal).await {
            Ok(ack) => {
                report.orders_submitted += 1;
                self.health.record_order();
                metrics::record_order("submitted");
                self.notifier
                    .notify(Notification::normal(
                        format!("{} {}", signal.side, signal.symbol),
                        format!(
                            "Order {} {} (client id {})",
                            ack.broker_order_id, ack.status, ack.client_order_id
                        ),
                    ))
                    .await;
                Disposition::MarkRead
            }
            Err(DispatchError::Broker(err)) if err.is_transient() => {
                tracing::warn!(
                    message_id = %signal.message_id,
                    symbol = %signal.symbol,
                    error = %err,
                    "Broker unavailable, signal will be retried"
                );
                if let Err(ledger_err) = self.ledger.release(&signal.message_id).await {
                    tracing::error!(
                        message_id = %signal.message_id,
                        error = %ledger_err,
                        "Could not release ledger entry, signal will not be retried"
                    );
                }
                report.skipped += 1;
                Disposition::LeaveUnread
            }
            Err(err) => {
                if matches!(err, DispatchError::Broker(_)) {
                    tracing::error!(
                        message_id = %signal.message_id,
                        symbol = %signal.symbol,
                        error = %err,
                        "Order failed"
                    );
                } else {
                    tracing::warn!(
                        message_id = %signal.message_id,
                        symbol = %signal.symbol,
                        reason = err.reason(),
                        error = %err,
                        "Trade rejected"
                    );
                }
                report.rejected += 1;
                self.health.record_rejection();
                metrics::record_order(err.reason());
                self.notifier
                    .notify(Notification::high(
                        format!("{} {} rejected", signal.side, signal.symbol),
                        err.to_string(),
                    ))
                    .await;
                Disposition::MarkRead
            }
        }
    }

    async fn mark_read(&self, message_id: &MessageId) -> Result<(), LoopError> {
        match self.mailbox.mark_read(message_id).await {
            Ok(()) => Ok(()),
            Err(MailboxError::Auth(err)) if !err.is_transient() => Err(self.fatal(err).await),
            Err(err) => {
                tracing::warn!(message_id = %message_id, error = %err, "Could not mark message read");
                Ok(())
            }
        }
    }

    fn is_stale(&self, message: &MailMessage) -> bool {
        let Some(max_age) = self.settings.max_message_age else {
            return false;
        };
        (Utc::now() - message.received_at)
            .to_std()
            .is_ok_and(|age| age > max_age)
    }

    async fn record_mailbox_failure(&mut self, err: &MailboxError) {
        if matches!(err, MailboxError::LabelNotFound(_)) {
            tracing::error!(error = %err, "Mailbox poll failed");
        } else {
            tracing::warn!(error = %err, "Mailbox poll failed, retrying next cycle");
        }
        self.health.record_failed_cycle();
        metrics::record_poll_failure();

        // Notify on the transition only; the loop polls every second.
        if !self.mailbox_degraded {
            self.mailbox_degraded = true;
            self.notifier
                .notify(Notification::high("Mailbox unavailable", err.to_string()))
                .await;
        }
    }

    async fn fatal(&self, err: AuthError) -> LoopError {
        tracing::error!(error = %err, "Authentication failed, stopping");
        self.notifier
            .notify(Notification::high("Authentication failed", err.to_string()))
            .await;
        LoopError::Auth(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::{BrokerError, LedgerError, OrderAck};
    use crate::application::services::DispatchPolicy;
    use crate::domain::order::OrderRequest;
    use crate::domain::signal::Symbol;
    use crate::infrastructure::ledger::InMemorySignalLedger;

    struct MockMailbox {
        messages: Mutex<Vec<MailMessage>>,
        fail_fetch: Mutex<Option<MailboxError>>,
        read: Mutex<Vec<MessageId>>,
    }

    impl MockMailbox {
        fn new(messages: Vec<MailMessage>) -> Self {
            Self {
                messages: Mutex::new(messages),
                fail_fetch: Mutex::new(None),
                read: Mutex::new(Vec::new()),
            }
        }

        fn read(&self) -> Vec<MessageId> {
            self.read.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailboxPort for MockMailbox {
        async fn fetch_unread(
            &self,
            _label: &str,
            _max_results: u32,
        ) -> Result<Vec<MailMessage>, MailboxError> {
            if let Some(err) = self.fail_fetch.lock().unwrap().take() {
                return Err(err);
            }
            let read = self.read.lock().unwrap().clone();
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| !read.contains(&m.id))
                .cloned()
                .collect())
        }

        async fn mark_read(&self, message_id: &MessageId) -> Result<(), MailboxError> {
            self.read.lock().unwrap().push(message_id.clone());
            Ok(())
        }
    }

    struct MockBroker {
        fail_with: Option<BrokerError>,
        submitted: Mutex<Vec<OrderRequest>>,
    }

    impl MockBroker {
        fn new() -> Self {
            Self {
                fail_with: None,
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrokerPort for MockBroker {
        async fn submit_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let ack = OrderAck {
                broker_order_id: "ord-1".to_string(),
                client_order_id: request.client_order_id.clone(),
                status: "accepted".to_string(),
                filled_qty: Decimal::ZERO,
            };
            self.submitted.lock().unwrap().push(request);
            Ok(ack)
        }

        async fn get_buying_power(&self) -> Result<Decimal, BrokerError> {
            Ok(dec!(1000))
        }

        async fn get_position(&self, _symbol: &Symbol) -> Result<Option<Decimal>, BrokerError> {
            Ok(None)
        }

        async fn get_latest_price(&self, _symbol: &Symbol) -> Result<Decimal, BrokerError> {
            Ok(dec!(10))
        }
    }

    /// Ledger whose store fails on lookup or on write.
    struct BrokenLedger {
        fail_contains: bool,
        fail_record: bool,
    }

    #[async_trait]
    impl SignalLedger for BrokenLedger {
        async fn contains(&self, _message_id: &MessageId) -> Result<bool, LedgerError> {
            if self.fail_contains {
                return Err(LedgerError::Storage("disk unavailable".to_string()));
            }
            Ok(false)
        }

        async fn record(&self, _message_id: &MessageId) -> Result<(), LedgerError> {
            if self.fail_record {
                return Err(LedgerError::Storage("disk full".to_string()));
            }
            Ok(())
        }

        async fn release(&self, _message_id: &MessageId) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotifierPort for RecordingNotifier {
        async fn notify(&self, notification: Notification) {
            self.sent.lock().unwrap().push(notification);
        }
    }

    fn message(id: &str, subject: &str, received_at: DateTime<Utc>) -> MailMessage {
        MailMessage {
            id: MessageId::new(id),
            subject: subject.to_string(),
            body: String::new(),
            received_at,
        }
    }

    fn build<L: SignalLedger>(
        mailbox: &Arc<MockMailbox>,
        broker: &Arc<MockBroker>,
        ledger: &Arc<L>,
        notifier: &Arc<RecordingNotifier>,
    ) -> SignalLoop<MockMailbox, MockBroker, L, RecordingNotifier> {
        SignalLoop::new(
            Arc::clone(mailbox),
            OrderDispatcher::new(Arc::clone(broker), DispatchPolicy::default()),
            Arc::clone(ledger),
            Arc::clone(notifier),
            SignalParser::new(),
            LoopSettings::default(),
        )
    }

    #[tokio::test]
    async fn processes_oldest_message_first() {
        let now = Utc::now();
        let mailbox = Arc::new(MockMailbox::new(vec![
            message("new", "We bought 1 BBB at $2", now),
            message("old", "We bought 1 AAA at $1", now - chrono::Duration::seconds(5)),
        ]));
        let broker = Arc::new(MockBroker::new());
        let mut signal_loop = build(
            &mailbox,
            &broker,
            &Arc::new(InMemorySignalLedger::new()),
            &Arc::default(),
        );

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.orders_submitted, 2);
        let symbols: Vec<String> = broker
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.symbol.to_string())
            .collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }

    #[tokio::test]
    async fn stale_message_is_marked_read_without_order() {
        let mailbox = Arc::new(MockMailbox::new(vec![message(
            "m1",
            "We bought 1 AAA at $1",
            Utc::now() - chrono::Duration::minutes(10),
        )]));
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(InMemorySignalLedger::new());
        let mut signal_loop = build(&mailbox, &broker, &ledger, &Arc::default());

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(broker.submitted.lock().unwrap().is_empty());
        assert_eq!(mailbox.read(), vec![MessageId::new("m1")]);
    }

    #[tokio::test]
    async fn transient_broker_failure_leaves_message_for_retry() {
        let mailbox = Arc::new(MockMailbox::new(vec![message(
            "m1",
            "We bought 1 AAA at $1",
            Utc::now(),
        )]));
        let mut broker = MockBroker::new();
        broker.fail_with = Some(BrokerError::RateLimited);
        let broker = Arc::new(broker);
        let ledger = Arc::new(InMemorySignalLedger::new());
        let mut signal_loop = build(&mailbox, &broker, &ledger, &Arc::default());

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(mailbox.read().is_empty());
        assert!(!ledger.contains(&MessageId::new("m1")).await.unwrap());
    }

    #[tokio::test]
    async fn rejected_trade_is_marked_read_and_notified() {
        let mailbox = Arc::new(MockMailbox::new(vec![message(
            "m1",
            "We sold to close 5 AAA at $1",
            Utc::now(),
        )]));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut signal_loop = build(
            &mailbox,
            &Arc::new(MockBroker::new()),
            &Arc::new(InMemorySignalLedger::new()),
            &notifier,
        );

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.rejected, 1);
        assert_eq!(mailbox.read(), vec![MessageId::new("m1")]);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, crate::application::ports::Priority::High);
    }

    #[tokio::test]
    async fn repeated_mailbox_failures_notify_once() {
        let mailbox = Arc::new(MockMailbox::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut signal_loop = build(
            &mailbox,
            &Arc::new(MockBroker::new()),
            &Arc::new(InMemorySignalLedger::new()),
            &notifier,
        );

        for _ in 0..3 {
            *mailbox.fail_fetch.lock().unwrap() =
                Some(MailboxError::Transport("timeout".to_string()));
            let report = signal_loop.poll_once().await.unwrap();
            assert!(report.mailbox_error.is_some());
        }

        assert_eq!(signal_loop.health().failed_cycles(), 3);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_lookup_failure_leaves_message_unread() {
        let mailbox = Arc::new(MockMailbox::new(vec![message(
            "m1",
            "We bought 1 AAA at $1",
            Utc::now(),
        )]));
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(BrokenLedger {
            fail_contains: true,
            fail_record: false,
        });
        let mut signal_loop = build(&mailbox, &broker, &ledger, &Arc::default());

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.signals, 0);
        assert!(broker.submitted.lock().unwrap().is_empty());
        assert!(mailbox.read().is_empty());
    }

    #[tokio::test]
    async fn ledger_write_failure_skips_dispatch() {
        let mailbox = Arc::new(MockMailbox::new(vec![message(
            "m1",
            "We bought 1 AAA at $1",
            Utc::now(),
        )]));
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(BrokenLedger {
            fail_contains: false,
            fail_record: true,
        });
        let mut signal_loop = build(&mailbox, &broker, &ledger, &Arc::default());

        let report = signal_loop.poll_once().await.unwrap();

        assert_eq!(report.signals, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.orders_submitted, 0);
        assert!(broker.submitted.lock().unwrap().is_empty());
        assert!(mailbox.read().is_empty());
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_skips_cycle() {
        let mailbox = Arc::new(MockMailbox::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut signal_loop = build(
            &mailbox,
            &Arc::new(MockBroker::new()),
            &Arc::new(InMemorySignalLedger::new()),
            &notifier,
        );
        *mailbox.fail_fetch.lock().unwrap() = Some(MailboxError::Auth(AuthError::Transport(
            "token endpoint returned 503".to_string(),
        )));

        let report = signal_loop.poll_once().await.unwrap();
        assert!(report.mailbox_error.is_some());

        let report = signal_loop.poll_once().await.unwrap();
        assert!(report.mailbox_error.is_none());
        assert_eq!(signal_loop.health().failed_cycles(), 1);
        assert_eq!(notifier.sent.lock().unwrap()[0].title, "Mailbox unavailable");
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let mailbox = Arc::new(MockMailbox::new(Vec::new()));
        let mut signal_loop = build(
            &mailbox,
            &Arc::new(MockBroker::new()),
            &Arc::new(InMemorySignalLedger::new()),
            &Arc::default(),
        );
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        signal_loop.run(shutdown).await.unwrap();
        assert_eq!(signal_loop.health().cycles_completed(), 0);
    }
}
