use std::time::Duration;

use async_trait::async_trait;
use leasehold_application::{Notification, NotificationPublisher};
use leasehold_core::{AppError, AppResult};
use serde_json::json;

/// Delivers notifications as JSON POSTs to one webhook endpoint.
pub struct HttpWebhookNotificationSink {
    http_client: reqwest::Client,
    endpoint: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpWebhookNotificationSink {
    /// Creates a new webhook sink.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl NotificationPublisher for HttpWebhookNotificationSink {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        let body = json!({
            "recipient_id": notification.recipient_id,
            "kind": notification.kind.as_str(),
            "payload": notification.payload,
        });

        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.endpoint.as_str())
                .header("X-Leasehold-Notification-Kind", notification.kind.as_str())
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} for notification webhook",
                        response.status()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Internal(format!(
                        "notification webhook rejected delivery with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("notification webhook transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "notification webhook failed without response".to_owned()
        })))
    }
}
