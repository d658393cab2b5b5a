//! Bot Configuration Settings
//!
//! Configuration types loaded from environment variables. `BotConfig` is
//! built once and passed by reference; nothing re-reads the environment
//! afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::services::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_INVEST_PERCENTAGE, DispatchPolicy, LoopSettings,
};
use crate::infrastructure::alpaca::{AlpacaConfig, AlpacaEnvironment};

/// Alpaca API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Brokerage settings.
#[derive(Debug, Clone)]
pub struct AlpacaSettings {
    /// API credentials.
    pub credentials: Credentials,
    /// Paper or live account.
    pub environment: AlpacaEnvironment,
}

impl AlpacaSettings {
    /// Adapter configuration for these settings.
    #[must_use]
    pub fn to_alpaca_config(&self) -> AlpacaConfig {
        AlpacaConfig::new(
            self.credentials.api_key().to_string(),
            self.credentials.api_secret().to_string(),
            self.environment,
        )
    }
}

/// Mailbox polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    /// Label holding signal emails.
    pub label: String,
    /// Messages fetched per poll.
    pub max_results: u32,
    /// Unread messages older than this are skipped (`None` disables).
    pub max_message_age: Option<Duration>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            label: "Tickeron".to_string(),
            max_results: 10,
            max_message_age: Some(Duration::from_secs(120)),
        }
    }
}

/// Order sizing and signal filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingSettings {
    /// Fraction of buying power per entry, in `(0, 1]`.
    pub invest_percentage: Decimal,
    /// Enables Short/Cover signals and short-on-SELL.
    pub short_enabled: bool,
    /// Only emails mentioning this name are signals; also the notification
    /// application name.
    pub robot_name: Option<String>,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            invest_percentage: DEFAULT_INVEST_PERCENTAGE,
            short_enabled: false,
            robot_name: None,
        }
    }
}

/// Google OAuth files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// OAuth client configuration downloaded from the Google console.
    pub client_secrets_path: PathBuf,
    /// Persisted token.
    pub token_path: PathBuf,
    /// Whether the browser consent flow may run when no token exists.
    pub interactive: bool,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            interactive: true,
        }
    }
}

/// Loop timing and local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSettings {
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// Processed-message ledger file.
    pub ledger_path: PathBuf,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            ledger_path: PathBuf::from("processed_messages.json"),
        }
    }
}

/// Push notification settings.
#[derive(Clone, Default)]
pub struct NotifySettings {
    /// Prowl API key; notifications are only logged when absent.
    pub prowl_api_key: Option<String>,
}

impl std::fmt::Debug for NotifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySettings")
            .field("prowl_api_key", &self.prowl_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObservabilitySettings {
    /// Prometheus endpoint port (0 = disabled).
    pub metrics_port: u16,
}

/// Complete bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Brokerage settings.
    pub alpaca: AlpacaSettings,
    /// Mailbox settings.
    pub mail: MailSettings,
    /// Order sizing.
    pub trading: TradingSettings,
    /// OAuth files.
    pub oauth: OAuthSettings,
    /// Loop timing.
    pub polling: PollingSettings,
    /// Push notifications.
    pub notify: NotifySettings,
    /// Metrics.
    pub observability: ObservabilitySettings,
}

impl BotConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// validated value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_key = env.required("ALPACA_API_KEY")?;
        let api_secret = env.required("ALPACA_API_SECRET")?;
        let alpaca = AlpacaSettings {
            credentials: Credentials::new(api_key, api_secret),
            environment: AlpacaEnvironment::from_paper_flag(env.bool("ALPACA_PAPER", true)?),
        };

        let mail_defaults = MailSettings::default();
        let max_age_secs = env.parsed("MAX_MESSAGE_AGE_SECS", 120_u64);
        let mail = MailSettings {
            label: env.optional("GMAIL_LABEL").unwrap_or(mail_defaults.label),
            max_results: env
                .parsed("GMAIL_MAX_RESULTS", mail_defaults.max_results)
                .max(1),
            max_message_age: (max_age_secs > 0).then_some(Duration::from_secs(max_age_secs)),
        };

        let trading = TradingSettings {
            invest_percentage: env.invest_percentage()?,
            short_enabled: env.bool("SHORT_ENABLED", false)?,
            robot_name: env.optional("ROBOT_NAME"),
        };

        let oauth_defaults = OAuthSettings::default();
        let oauth = OAuthSettings {
            client_secrets_path: env
                .optional("GOOGLE_CLIENT_SECRETS_PATH")
                .map_or(oauth_defaults.client_secrets_path, PathBuf::from),
            token_path: env
                .optional("GOOGLE_TOKEN_PATH")
                .map_or(oauth_defaults.token_path, PathBuf::from),
            interactive: env.bool("OAUTH_INTERACTIVE", oauth_defaults.interactive)?,
        };

        let polling_defaults = PollingSettings::default();
        let polling = PollingSettings {
            poll_interval: Duration::from_millis(
                env.parsed("POLL_INTERVAL_MS", 1000_u64).max(100),
            ),
            heartbeat_interval: Duration::from_secs(
                env.parsed("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL.as_secs())
                    .max(1),
            ),
            ledger_path: env
                .optional("PROCESSED_LEDGER_PATH")
                .map_or(polling_defaults.ledger_path, PathBuf::from),
        };

        let notify = NotifySettings {
            prowl_api_key: env.optional("PROWL_API_KEY"),
        };

        let observability = ObservabilitySettings {
            metrics_port: env.parsed("METRICS_PORT", 0_u16),
        };

        Ok(Self {
            alpaca,
            mail,
            trading,
            oauth,
            polling,
            notify,
            observability,
        })
    }

    /// Loop settings derived from the mail and polling groups.
    #[must_use]
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            label: self.mail.label.clone(),
            max_results: self.mail.max_results,
            poll_interval: self.polling.poll_interval,
            max_message_age: self.mail.max_message_age,
            heartbeat_interval: self.polling.heartbeat_interval,
        }
    }

    /// Dispatcher sizing policy.
    #[must_use]
    pub const fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            invest_percentage: self.trading.invest_percentage,
            short_enabled: self.trading.short_enabled,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value outside its domain.
    #[error("invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// Variable source with typed accessors.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        let value = (self.0)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::EmptyValue(key.to_string()));
        }
        Ok(value.to_string())
    }

    /// Parsed value, falling back to `default` when unset or unparseable.
    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.optional(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
                reason: "expected true or false".to_string(),
            }),
        }
    }

    fn invest_percentage(&self) -> Result<Decimal, ConfigError> {
        const KEY: &str = "INVEST_PERCENTAGE";
        let Some(value) = self.optional(KEY) else {
            return Ok(DEFAULT_INVEST_PERCENTAGE);
        };
        let invalid = |value: String| ConfigError::InvalidValue {
            key: KEY.to_string(),
            value,
            reason: "expected a fraction in (0, 1]".to_string(),
        };
        let Ok(percentage) = Decimal::from_str(&value) else {
            return Err(invalid(value));
        };
        if percentage <= Decimal::ZERO || percentage > Decimal::ONE {
            return Err(invalid(value));
        }
        Ok(percentage)
    }
}
