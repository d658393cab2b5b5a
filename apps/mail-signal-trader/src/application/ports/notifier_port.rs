//! Notifier Port (Driven Port)
//!
//! Push notifications for trades and loop errors. Delivery is best effort:
//! implementations log failures and never return them.

use async_trait::async_trait;

/// Notification urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Informational (orders placed).
    Normal,
    /// Needs attention (rejected trades, loop errors).
    High,
}

/// A push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short event title.
    pub title: String,
    /// Event details.
    pub description: String,
    /// Urgency.
    pub priority: Priority,
}

impl Notification {
    /// Informational notification.
    #[must_use]
    pub fn normal(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: Priority::Normal,
        }
    }

    /// High-priority notification.
    #[must_use]
    pub fn high(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: Priority::High,
        }
    }
}

/// Port for push notifications.
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver a notification.
    async fn notify(&self, notification: Notification);
}
