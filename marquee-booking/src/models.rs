use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    Momo,
    ZaloPay,
}

/// A booking is the unit the state machine runs over. The seat hold in the
/// lock store uses the booking id as its token, so every hold can be traced
/// back to exactly one booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub base_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_state: PaymentState,
    pub promotion_code: Option<String>,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: impl Into<String>,
        showtime_id: Uuid,
        seat_ids: Vec<Uuid>,
        quote: &marquee_promo::Quote,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            showtime_id,
            seat_ids,
            base_amount: quote.base_amount,
            discount_amount: quote.discount,
            total_amount: quote.total,
            status: BookingStatus::Pending,
            payment_method,
            payment_state: PaymentState::Pending,
            promotion_code: quote.promotion_code.clone(),
            transaction_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence seam for bookings. The two `mark_*` methods are
/// compare-and-set transitions: they only move a booking out of `Pending`
/// and report whether this caller performed the move. Duplicate payment
/// callbacks and the expiry sweep race through these without ever applying
/// a transition twice.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> Result<(), CoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, CoreError>;

    /// `Pending` -> `Confirmed`, recording the gateway transaction.
    /// Returns false when the booking was no longer pending.
    async fn mark_confirmed(&self, id: Uuid, transaction_ref: &str) -> Result<bool, CoreError>;

    /// `Pending` -> `Cancelled` with the given payment outcome. Returns
    /// false when the booking was no longer pending.
    async fn mark_cancelled(&self, id: Uuid, payment_state: PaymentState)
        -> Result<bool, CoreError>;

    /// Record the gateway order reference handed out when payment starts.
    async fn set_transaction_ref(&self, id: Uuid, transaction_ref: &str) -> Result<(), CoreError>;

    /// Pending bookings older than the cutoff, for the expiry sweep.
    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, CoreError>;
}

/// In-memory booking store for tests and single-process deployments.
pub struct MemoryBookingRepository {
    inner: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), CoreError> {
        let mut map = self.inner.lock().unwrap();
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError> {
        let map = self.inner.lock().unwrap();
        Ok(map.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, CoreError> {
        let map = self.inner.lock().unwrap();
        let mut bookings: Vec<Booking> = map
            .values()
            .filter(|booking| booking.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| std::cmp::Reverse(booking.created_at));
        Ok(bookings)
    }

    async fn mark_confirmed(&self, id: Uuid, transaction_ref: &str) -> Result<bool, CoreError> {
        let mut map = self.inner.lock().unwrap();
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {id}")))?;
        if booking.status != BookingStatus::Pending {
            return Ok(false);
        }
        booking.status = BookingStatus::Confirmed;
        booking.payment_state = PaymentState::Paid;
        booking.transaction_ref = Some(transaction_ref.to_string());
        booking.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        payment_state: PaymentState,
    ) -> Result<bool, CoreError> {
        let mut map = self.inner.lock().unwrap();
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {id}")))?;
        if booking.status != BookingStatus::Pending {
            return Ok(false);
        }
        booking.status = BookingStatus::Cancelled;
        booking.payment_state = payment_state;
        booking.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_transaction_ref(&self, id: Uuid, transaction_ref: &str) -> Result<(), CoreError> {
        let mut map = self.inner.lock().unwrap();
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {id}")))?;
        booking.transaction_ref = Some(transaction_ref.to_string());
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, CoreError> {
        let map = self.inner.lock().unwrap();
        Ok(map
            .values()
            .filter(|booking| {
                booking.status == BookingStatus::Pending && booking.created_at < cutoff
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_promo::Quote;

    fn pending_booking() -> Booking {
        let quote = Quote {
            base_amount: 2500,
            discount: 0,
            total: 2500,
            promotion_code: None,
        };
        Booking::new(
            "user-1",
            Uuid::new_v4(),
            vec![Uuid::new_v4()],
            &quote,
            PaymentMethod::Momo,
        )
    }

    #[tokio::test]
    async fn mark_confirmed_wins_exactly_once() {
        let repo = MemoryBookingRepository::new();
        let booking = pending_booking();
        repo.insert(&booking).await.unwrap();

        assert!(repo.mark_confirmed(booking.id, "tx-1").await.unwrap());
        assert!(!repo.mark_confirmed(booking.id, "tx-2").await.unwrap());

        let stored = repo.get(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.payment_state, PaymentState::Paid);
        assert_eq!(stored.transaction_ref.as_deref(), Some("tx-1"));
    }

    #[tokio::test]
    async fn cancel_does_not_touch_a_confirmed_booking() {
        let repo = MemoryBookingRepository::new();
        let booking = pending_booking();
        repo.insert(&booking).await.unwrap();

        repo.mark_confirmed(booking.id, "tx-1").await.unwrap();
        assert!(!repo
            .mark_cancelled(booking.id, PaymentState::Failed)
            .await
            .unwrap());

        let stored = repo.get(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn pending_cutoff_filters_by_age_and_status() {
        let repo = MemoryBookingRepository::new();
        let mut stale = pending_booking();
        stale.created_at = Utc::now() - chrono::Duration::minutes(30);
        let fresh = pending_booking();
        repo.insert(&stale).await.unwrap();
        repo.insert(&fresh).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::minutes(10);
        let expired = repo.pending_created_before(cutoff).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
    }
}
