use async_trait::async_trait;

use crate::application::ports::{Notification, NotifierPort, Priority};

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, notification: Notification) {
        match notification.priority {
            Priority::Normal => tracing::info!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
            Priority::High => tracing::warn!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
        }
    }
}
