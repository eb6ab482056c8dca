use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    BookingCreated,
    BookingConfirmed,
    RideStarted,
    RideCompleted,
    BookingCancelled,
    RatingReceived,
}

/// Fire-and-forget delivery of booking events.
///
/// `notify` must return promptly and never fail from the caller's point of
/// view; delivery problems are logged and dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent, recipient: Uuid, payload: Value);
}

/// Writes events to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: NotificationEvent, recipient: Uuid, payload: Value) {
        tracing::info!(?event, %recipient, %payload, "Notification");
    }
}

/// POSTs each event as JSON to a webhook from a background task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: NotificationEvent, recipient: Uuid, payload: Value) {
        let body = json!({
            "event": event,
            "recipient": recipient,
            "payload": payload,
            "sent_at": Utc::now(),
        });

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(?event, %recipient, "No runtime available, dropping notification");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        runtime.spawn(async move {
            let result = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            if let Err(e) = result {
                tracing::warn!(?event, %recipient, error = %e, "Notification delivery failed");
            }
        });
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_failures_are_swallowed() {
        // Nothing listens on port 9; delivery fails in the background task.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        notifier.notify(
            NotificationEvent::BookingCreated,
            Uuid::new_v4(),
            json!({ "booking_id": Uuid::new_v4() }),
        );
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_webhook_without_runtime_does_not_panic() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        notifier.notify(NotificationEvent::RideCompleted, Uuid::new_v4(), json!({}));
    }
}
