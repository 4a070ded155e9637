use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_booking::models::{
    Booking, BookingRepository, BookingStatus, PaymentMethod, PaymentState,
};
use marquee_core::CoreError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    showtime_id: Uuid,
    seat_ids: Vec<Uuid>,
    base_amount: i64,
    discount_amount: i64,
    total_amount: i64,
    status: String,
    payment_method: String,
    payment_state: String,
    promotion_code: Option<String>,
    transaction_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(value: &str) -> Result<BookingStatus, CoreError> {
    match value {
        "PENDING" => Ok(BookingStatus::Pending),
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        other => Err(CoreError::Storage(format!("unknown booking status {other}"))),
    }
}

fn parse_payment_state(value: &str) -> Result<PaymentState, CoreError> {
    match value {
        "PENDING" => Ok(PaymentState::Pending),
        "PAID" => Ok(PaymentState::Paid),
        "FAILED" => Ok(PaymentState::Failed),
        other => Err(CoreError::Storage(format!("unknown payment state {other}"))),
    }
}

fn parse_payment_method(value: &str) -> Result<PaymentMethod, CoreError> {
    match value {
        "CASH" => Ok(PaymentMethod::Cash),
        "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
        "MOMO" => Ok(PaymentMethod::Momo),
        "ZALO_PAY" => Ok(PaymentMethod::ZaloPay),
        other => Err(CoreError::Storage(format!("unknown payment method {other}"))),
    }
}

fn payment_method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "CASH",
        PaymentMethod::CreditCard => "CREDIT_CARD",
        PaymentMethod::Momo => "MOMO",
        PaymentMethod::ZaloPay => "ZALO_PAY",
    }
}

fn payment_state_str(state: PaymentState) -> &'static str {
    match state {
        PaymentState::Pending => "PENDING",
        PaymentState::Paid => "PAID",
        PaymentState::Failed => "FAILED",
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            seat_ids: row.seat_ids,
            base_amount: row.base_amount,
            discount_amount: row.discount_amount,
            total_amount: row.total_amount,
            status: parse_status(&row.status)?,
            payment_method: parse_payment_method(&row.payment_method)?,
            payment_state: parse_payment_state(&row.payment_state)?,
            promotion_code: row.promotion_code,
            transaction_ref: row.transaction_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, user_id, showtime_id, seat_ids, base_amount, discount_amount,
                 total_amount, status, payment_method, payment_state,
                 promotion_code, transaction_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(booking.showtime_id)
        .bind(&booking.seat_ids)
        .bind(booking.base_amount)
        .bind(booking.discount_amount)
        .bind(booking.total_amount)
        .bind(booking.status.as_str())
        .bind(payment_method_str(booking.payment_method))
        .bind(payment_state_str(booking.payment_state))
        .bind(&booking.promotion_code)
        .bind(&booking.transaction_ref)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError> {
        let row: Option<BookingRow> =
            sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(CoreError::storage)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, CoreError> {
        let rows: Vec<BookingRow> =
            sqlx::query_as("SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(CoreError::storage)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn mark_confirmed(&self, id: Uuid, transaction_ref: &str) -> Result<bool, CoreError> {
        // Status guard in the WHERE clause makes the transition a
        // compare-and-set; the row count says whether this caller won.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CONFIRMED', payment_state = 'PAID',
                transaction_ref = $2, updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(transaction_ref)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_cancelled(
        &self,
        id: Uuid,
        payment_state: PaymentState,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', payment_state = $2, updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(payment_state_str(payment_state))
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_transaction_ref(&self, id: Uuid, transaction_ref: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE bookings SET transaction_ref = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(transaction_ref)
            .execute(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(())
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, CoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT * FROM bookings WHERE status = 'PENDING' AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(Booking::try_from).collect()
    }
}
