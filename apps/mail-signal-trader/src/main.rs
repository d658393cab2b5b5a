//! Mail Signal Trader Binary
//!
//! Polls the configured Gmail label and trades the signals it finds.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin mail-signal-trader
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALPACA_API_KEY`: Alpaca API key
//! - `ALPACA_API_SECRET`: Alpaca API secret
//!
//! ## Optional
//! - `ALPACA_PAPER`: trade the paper account (default: true)
//! - `GMAIL_LABEL`: label to poll (default: Tickeron)
//! - `INVEST_PERCENTAGE`: buying power fraction per entry (default: 0.95)
//! - `SHORT_ENABLED`, `ROBOT_NAME`, `PROWL_API_KEY`
//! - `GOOGLE_CLIENT_SECRETS_PATH`, `GOOGLE_TOKEN_PATH`, `OAUTH_INTERACTIVE`
//! - `POLL_INTERVAL_MS`, `HEARTBEAT_INTERVAL_SECS`, `MAX_MESSAGE_AGE_SECS`
//! - `GMAIL_MAX_RESULTS`, `PROCESSED_LEDGER_PATH`, `METRICS_PORT`, `LOG_DIR`
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use mail_signal_trader::infrastructure::alpaca::AlpacaBrokerAdapter;
use mail_signal_trader::infrastructure::gmail::GmailMailbox;
use mail_signal_trader::infrastructure::google_auth::GoogleTokenStore;
use mail_signal_trader::infrastructure::ledger::FileSignalLedger;
use mail_signal_trader::infrastructure::metrics::MetricsServer;
use mail_signal_trader::infrastructure::notify::Notifier;
use mail_signal_trader::{
    BotConfig, CredentialCache, OrderDispatcher, SignalLoop, SignalParser, init_metrics,
    init_telemetry,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Application name shown in push notifications when no robot name is set.
const DEFAULT_APPLICATION: &str = "mail-signal-trader";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (console, log file, optional OTLP)
    let _telemetry_guard = init_telemetry();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Mail Signal Trader");

    let config = BotConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Prometheus metrics
    init_metrics().context("failed to install metrics recorder")?;
    if config.observability.metrics_port != 0 {
        let metrics_server =
            MetricsServer::new(config.observability.metrics_port, shutdown_token.clone());
        tokio::spawn(async move {
            if let Err(e) = metrics_server.run().await {
                tracing::error!(error = %e, "Metrics server error");
            }
        });
    }

    // Mailbox
    let token_store = GoogleTokenStore::new(
        &config.oauth.client_secrets_path,
        &config.oauth.token_path,
        config.oauth.interactive,
    )
    .context("failed to build OAuth client")?;
    let mailbox = GmailMailbox::new(CredentialCache::new(Arc::new(token_store)))
        .context("failed to build Gmail client")?;
    mailbox
        .authorize()
        .await
        .context("mailbox authorization failed")?;
    tracing::info!("Mailbox credential ready");

    // Broker
    let broker = AlpacaBrokerAdapter::new(&config.alpaca.to_alpaca_config())
        .context("failed to build Alpaca client")?;
    let dispatcher = OrderDispatcher::new(Arc::new(broker), config.dispatch_policy());

    // Ledger and notifications
    let ledger = FileSignalLedger::open(&config.polling.ledger_path)
        .await
        .context("failed to open processed-message ledger")?;
    let application = config
        .trading
        .robot_name
        .as_deref()
        .unwrap_or(DEFAULT_APPLICATION);
    let notifier = Notifier::from_settings(config.notify.prowl_api_key.as_deref(), application)
        .context("failed to build notifier")?;

    let parser = match &config.trading.robot_name {
        Some(name) => SignalParser::new().with_robot_name(name.clone()),
        None => SignalParser::new(),
    };

    let mut signal_loop = SignalLoop::new(
        Arc::new(mailbox),
        dispatcher,
        Arc::new(ledger),
        Arc::new(notifier),
        parser,
        config.loop_settings(),
    );

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let result = signal_loop.run(shutdown_token.clone()).await;
    shutdown_token.cancel();

    let health = signal_loop.health();
    tracing::info!(
        cycles = health.cycles_completed(),
        signals = health.signals_detected(),
        orders = health.orders_submitted(),
        rejected = health.trades_rejected(),
        "Mail Signal Trader stopped"
    );

    result.context("signal loop stopped")
}

/// Log the parsed configuration.
fn log_config(config: &BotConfig) {
    tracing::info!(
        environment = %config.alpaca.environment,
        label = %config.mail.label,
        invest_percentage = %config.trading.invest_percentage,
        short_enabled = config.trading.short_enabled,
        robot_name = config.trading.robot_name.as_deref().unwrap_or("-"),
        poll_interval_ms = config.polling.poll_interval.as_millis(),
        metrics_port = config.observability.metrics_port,
        prowl = config.notify.prowl_api_key.is_some(),
        "Configuration loaded"
    );
    tracing::debug!(
        client_secrets = %config.oauth.client_secrets_path.display(),
        token = %config.oauth.token_path.display(),
        ledger = %config.polling.ledger_path.display(),
        "Local files"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
