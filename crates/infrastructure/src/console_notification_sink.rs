//! Console notification sink for development. Logs notifications to tracing output.

use async_trait::async_trait;
use leasehold_application::{Notification, NotificationPublisher};
use leasehold_core::AppResult;
use tracing::info;

/// Development notification sink that logs notifications to the console.
#[derive(Clone, Default)]
pub struct ConsoleNotificationSink;

impl ConsoleNotificationSink {
    /// Creates a new console notification sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationPublisher for ConsoleNotificationSink {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        info!(
            recipient_id = %notification.recipient_id,
            kind = notification.kind.as_str(),
            payload = %notification.payload,
            "notification delivered to console"
        );

        Ok(())
    }
}
