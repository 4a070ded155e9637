use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SeatsHeldEvent {
    pub showtime_id: Uuid,
    pub booking_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub held_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub showtime_id: Uuid,
    pub user_id: String,
    pub total_amount: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub showtime_id: Uuid,
    pub user_id: String,
    pub timestamp: i64,
}

/// Envelope carried on the in-process broadcast channel; also what the SSE
/// endpoint serialises for subscribed clients.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub user_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}
