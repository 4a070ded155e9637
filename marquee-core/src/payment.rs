use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle returned after a payment request is lodged with the provider.
/// The client is redirected to `pay_url`; `transaction_ref` is the
/// provider's reference, recorded on the booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRedirect {
    pub pay_url: String,
    pub request_id: String,
    pub transaction_ref: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Build and lodge a signed payment request for a booking. Does not
    /// mutate booking state; the caller records the transaction ref.
    async fn create_payment(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_info: &str,
    ) -> Result<PaymentRedirect, Box<dyn std::error::Error + Send + Sync>>;
}
