//! Push Notification Adapters
//!
//! - [`ProwlNotifier`]: iOS push via the Prowl public API
//! - [`LogNotifier`]: writes notifications to the log only
//! - [`Notifier`]: runtime choice between the two

mod log_only;
mod prowl;

use async_trait::async_trait;

pub use log_only::LogNotifier;
pub use prowl::{PROWL_API_URL, ProwlNotifier};

use crate::application::ports::{Notification, NotifierPort};

/// Notifier selected from configuration.
#[derive(Debug)]
pub enum Notifier {
    /// Prowl push notifications.
    Prowl(ProwlNotifier),
    /// Log-only.
    Log(LogNotifier),
}

impl Notifier {
    /// Prowl when an API key is configured, log-only otherwise.
    pub fn from_settings(
        prowl_api_key: Option<&str>,
        application: &str,
    ) -> Result<Self, reqwest::Error> {
        match prowl_api_key {
            Some(key) => Ok(Self::Prowl(ProwlNotifier::new(key, application)?)),
            None => Ok(Self::Log(LogNotifier)),
        }
    }
}

#[async_trait]
impl NotifierPort for Notifier {
    async fn notify(&self, notification: Notification) {
        match self {
            Self::Prowl(prowl) => prowl.notify(notification).await,
            Self::Log(log) => log.notify(notification).await,
        }
    }
}
