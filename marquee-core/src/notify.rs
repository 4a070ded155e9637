use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    /// A confirmed booking whose seat hold was lost to another booking.
    /// Needs operator reconciliation; the customer has already paid.
    SeatConflict,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingCreated => "BOOKING_CREATED",
            NotificationKind::BookingConfirmed => "BOOKING_CONFIRMED",
            NotificationKind::BookingCancelled => "BOOKING_CANCELLED",
            NotificationKind::SeatConflict => "SEAT_CONFLICT",
        }
    }
}

/// Fire-and-forget notification out-call. Implementations must swallow and
/// log delivery failures; a lost notification never fails a booking
/// transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: serde_json::Value);
}

/// No-op notifier for tests and local tooling.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, user_id: &str, kind: NotificationKind, _payload: serde_json::Value) {
        tracing::debug!("notification suppressed: {} for {}", kind.as_str(), user_id);
    }
}
