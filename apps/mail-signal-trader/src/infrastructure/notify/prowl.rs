use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{Notification, NotifierPort, Priority};

/// Prowl `add` endpoint.
pub const PROWL_API_URL: &str = "https://api.prowlapp.com/publicapi/add";

/// Prowl push notifier. Delivery failures are logged, never returned.
#[derive(Clone)]
pub struct ProwlNotifier {
    client: Client,
    api_key: String,
    application: String,
    url: String,
}

impl ProwlNotifier {
    /// Create a notifier posting to the public Prowl API.
    pub fn new(
        api_key: impl Into<String>,
        application: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            application: application.into(),
            url: PROWL_API_URL.to_string(),
        })
    }

    /// Post to another endpoint (local mock servers).
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl std::fmt::Debug for ProwlNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProwlNotifier")
            .field("api_key", &"[REDACTED]")
            .field("application", &self.application)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Prowl priority scale is -2 (very low) to 2 (emergency).
const fn prowl_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Normal => "0",
        Priority::High => "2",
    }
}

#[async_trait]
impl NotifierPort for ProwlNotifier {
    async fn notify(&self, notification: Notification) {
        let form = [
            ("apikey", self.api_key.as_str()),
            ("application", self.application.as_str()),
            ("event", notification.title.as_str()),
            ("description", notification.description.as_str()),
            ("priority", prowl_priority(notification.priority)),
        ];

        match self.client.post(&self.url).form(&form).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(event = %notification.title, "Notification sent");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(
                    event = %notification.title,
                    %status,
                    body = %body,
                    "Prowl rejected notification"
                );
            }
            Err(e) => {
                tracing::warn!(event = %notification.title, error = %e, "Prowl unreachable");
            }
        }
    }
}
