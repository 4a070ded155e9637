use async_trait::async_trait;
use chrono::Utc;
use marquee_core::notify::{NotificationKind, Notifier};
use marquee_shared::events::NotificationEvent;
use tokio::sync::broadcast;

/// Fans booking notifications out on an in-process broadcast channel. The
/// API layer subscribes per SSE connection; lagging or absent subscribers
/// are dropped silently, which is exactly the fire-and-forget contract.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<NotificationEvent> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: serde_json::Value) {
        let event = NotificationEvent {
            user_id: user_id.to_string(),
            kind: kind.as_str().to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        };
        // send only fails when nobody is listening
        if self.tx.send(event).is_err() {
            tracing::debug!(user_id, kind = kind.as_str(), "no notification subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_the_event() {
        let notifier = BroadcastNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier
            .notify(
                "alice",
                NotificationKind::BookingConfirmed,
                serde_json::json!({ "bookingId": "b-1" }),
            )
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, "alice");
        assert_eq!(event.kind, "BOOKING_CONFIRMED");
    }

    #[tokio::test]
    async fn no_subscriber_is_not_an_error() {
        let notifier = BroadcastNotifier::new(16);
        notifier
            .notify(
                "alice",
                NotificationKind::BookingCreated,
                serde_json::json!({}),
            )
            .await;
    }
}
