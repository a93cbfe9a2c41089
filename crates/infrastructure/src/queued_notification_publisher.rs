use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leasehold_application::{Notification, NotificationPublisher};
use leasehold_core::{AppError, AppResult};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bounded outbox in front of a delivery sink.
///
/// `notify` only enqueues. A background task drains the queue and gives each
/// delivery at most `delivery_timeout`. The task ends once every publisher
/// handle is dropped and the queue is empty.
#[derive(Clone)]
pub struct QueuedNotificationPublisher {
    sender: mpsc::Sender<Notification>,
}

impl QueuedNotificationPublisher {
    /// Starts the drain task on the current runtime.
    #[must_use]
    pub fn spawn(
        delivery: Arc<dyn NotificationPublisher>,
        capacity: usize,
        delivery_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain(delivery, receiver, delivery_timeout));

        (Self { sender }, handle)
    }
}

#[async_trait]
impl NotificationPublisher for QueuedNotificationPublisher {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        self.sender
            .try_send(notification)
            .map_err(|error| match error {
                TrySendError::Full(notification) => AppError::Internal(format!(
                    "notification queue is full, dropping '{}' for '{}'",
                    notification.kind.as_str(),
                    notification.recipient_id
                )),
                TrySendError::Closed(_) => {
                    AppError::Internal("notification queue is closed".to_owned())
                }
            })
    }
}

async fn drain(
    delivery: Arc<dyn NotificationPublisher>,
    mut receiver: mpsc::Receiver<Notification>,
    delivery_timeout: Duration,
) {
    while let Some(notification) = receiver.recv().await {
        let kind = notification.kind.as_str();
        let recipient_id = notification.recipient_id.clone();

        match tokio::time::timeout(delivery_timeout, delivery.notify(notification)).await {
            Ok(Ok(())) => debug!(kind, recipient_id = %recipient_id, "notification delivered"),
            Ok(Err(error)) => warn!(
                kind,
                recipient_id = %recipient_id,
                error = %error,
                "notification delivery failed"
            ),
            Err(_) => warn!(
                kind,
                recipient_id = %recipient_id,
                timeout_ms = delivery_timeout.as_millis() as u64,
                "notification delivery timed out"
            ),
        }
    }
}
