//! Configuration Module
//!
//! Environment-driven configuration for the bot, read once at startup.

mod settings;

pub use settings::{
    AlpacaSettings, BotConfig, ConfigError, Credentials, MailSettings, NotifySettings,
    OAuthSettings, ObservabilitySettings, PollingSettings, TradingSettings,
};
