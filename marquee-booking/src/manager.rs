use crate::models::{Booking, BookingRepository, BookingStatus, PaymentMethod, PaymentState};
use chrono::{DateTime, Duration, Utc};
use marquee_catalog::{SeatLockStore, ShowtimeRepository};
use marquee_core::notify::{NotificationKind, Notifier};
use marquee_core::{Actor, CoreError};
use marquee_promo::PromotionEngine;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub payment_method: PaymentMethod,
    pub promotion_code: Option<String>,
}

/// Drives the booking lifecycle: Pending on creation, then exactly one of
/// Confirmed or Cancelled. Seat holds, pricing and notifications all hang
/// off these transitions.
pub struct BookingManager {
    bookings: Arc<dyn BookingRepository>,
    showtimes: Arc<dyn ShowtimeRepository>,
    locks: Arc<dyn SeatLockStore>,
    promotions: Arc<PromotionEngine>,
    notifier: Arc<dyn Notifier>,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        showtimes: Arc<dyn ShowtimeRepository>,
        locks: Arc<dyn SeatLockStore>,
        promotions: Arc<PromotionEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bookings,
            showtimes,
            locks,
            promotions,
            notifier,
        }
    }

    /// Create a pending booking, holding every requested seat or none of
    /// them. The booking id doubles as the hold token, so a failure after
    /// the hold can always release exactly what it took.
    pub async fn create(&self, actor: &Actor, req: CreateBooking) -> Result<Booking, CoreError> {
        let mut seat_ids = req.seat_ids;
        seat_ids.sort();
        seat_ids.dedup();
        if seat_ids.is_empty() {
            return Err(CoreError::Validation("at least one seat is required".into()));
        }

        let showtime = self
            .showtimes
            .get_showtime(req.showtime_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::NotFound(format!("showtime {}", req.showtime_id)))?;
        if !showtime.is_bookable() {
            return Err(CoreError::ShowtimeUnavailable);
        }

        let seats = self.showtimes.seats_by_ids(&seat_ids).await?;
        if seats.iter().any(|seat| seat.room_id != showtime.room_id) {
            return Err(CoreError::Validation(
                "seat does not belong to the showtime's room".into(),
            ));
        }

        let booking_id = Uuid::new_v4();
        self.locks
            .try_lock(showtime.id, &seat_ids, booking_id)
            .await?;

        let prices: Vec<i64> = seats.iter().map(|seat| seat.price).collect();
        let quote = match self
            .promotions
            .quote(
                &prices,
                req.promotion_code.as_deref(),
                showtime.movie_id,
                showtime.cinema_id,
                Utc::now(),
            )
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                self.release_quietly(showtime.id, &seat_ids, booking_id).await;
                return Err(err.into());
            }
        };

        let mut booking = Booking::new(
            &actor.user_id,
            showtime.id,
            seat_ids.clone(),
            &quote,
            req.payment_method,
        );
        booking.id = booking_id;

        if let Err(err) = self.bookings.insert(&booking).await {
            self.release_quietly(showtime.id, &seat_ids, booking_id).await;
            return Err(err);
        }

        tracing::info!(
            booking_id = %booking.id,
            showtime_id = %showtime.id,
            seats = seat_ids.len(),
            total = booking.total_amount,
            "booking created"
        );
        self.notifier
            .notify(
                &booking.user_id,
                NotificationKind::BookingCreated,
                serde_json::json!({
                    "bookingId": booking.id,
                    "showtimeId": booking.showtime_id,
                    "seatIds": booking.seat_ids,
                    "totalAmount": booking.total_amount,
                }),
            )
            .await;
        Ok(booking)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Booking, CoreError> {
        let booking = self
            .bookings
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {id}")))?;
        if !actor.can_manage(&booking.user_id) {
            return Err(CoreError::Forbidden);
        }
        Ok(booking)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Booking>, CoreError> {
        self.bookings.list_for_user(user_id).await
    }

    /// Successful payment outcome. Idempotent: a duplicate callback on an
    /// already-confirmed booking returns the booking unchanged; only the
    /// transition winner makes holds permanent and consumes promotion
    /// usage.
    pub async fn confirm_payment(
        &self,
        booking_id: Uuid,
        transaction_ref: &str,
    ) -> Result<Booking, CoreError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;

        match booking.status {
            BookingStatus::Confirmed => return Ok(booking),
            BookingStatus::Cancelled => {
                return Err(CoreError::InvalidTransition {
                    from: booking.status.as_str().into(),
                    to: BookingStatus::Confirmed.as_str().into(),
                })
            }
            BookingStatus::Pending => {}
        }

        let won = self
            .bookings
            .mark_confirmed(booking_id, transaction_ref)
            .await?;
        if !won {
            // Lost the race; re-read and apply the terminal rules above.
            let current = self
                .bookings
                .get(booking_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;
            return match current.status {
                BookingStatus::Confirmed => Ok(current),
                _ => Err(CoreError::InvalidTransition {
                    from: current.status.as_str().into(),
                    to: BookingStatus::Confirmed.as_str().into(),
                }),
            };
        }

        if let Err(err) = self
            .locks
            .confirm(booking.showtime_id, &booking.seat_ids, booking.id)
            .await
        {
            // The customer has paid; the booking stays confirmed. Raise a
            // reconciliation event so operators resolve the seat clash
            // instead of it dying in a log line.
            tracing::error!(
                booking_id = %booking.id,
                showtime_id = %booking.showtime_id,
                error = %err,
                "seat hold lost before confirmation, reconciliation required"
            );
            self.notifier
                .notify(
                    &booking.user_id,
                    NotificationKind::SeatConflict,
                    serde_json::json!({
                        "bookingId": booking.id,
                        "showtimeId": booking.showtime_id,
                        "seatIds": booking.seat_ids,
                        "error": err.to_string(),
                    }),
                )
                .await;
        }

        if let Some(code) = &booking.promotion_code {
            match self.promotions.commit_usage(code).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(booking_id = %booking.id, code, "promotion usage limit reached at confirmation")
                }
                Err(err) => {
                    tracing::warn!(booking_id = %booking.id, code, error = %err, "promotion usage commit failed")
                }
            }
        }

        tracing::info!(booking_id = %booking.id, transaction_ref, "booking confirmed");
        self.notifier
            .notify(
                &booking.user_id,
                NotificationKind::BookingConfirmed,
                serde_json::json!({
                    "bookingId": booking.id,
                    "showtimeId": booking.showtime_id,
                    "transactionRef": transaction_ref,
                }),
            )
            .await;

        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))
    }

    /// Failed payment outcome. A no-op on bookings already in a terminal
    /// state, so late or duplicate failure callbacks cannot undo a
    /// confirmation.
    pub async fn fail_payment(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;
        if booking.status.is_terminal() {
            return Ok(booking);
        }

        let won = self
            .bookings
            .mark_cancelled(booking_id, PaymentState::Failed)
            .await?;
        if won {
            self.release_quietly(booking.showtime_id, &booking.seat_ids, booking.id)
                .await;
            tracing::info!(booking_id = %booking.id, "booking cancelled after failed payment");
            self.notifier
                .notify(
                    &booking.user_id,
                    NotificationKind::BookingCancelled,
                    serde_json::json!({
                        "bookingId": booking.id,
                        "showtimeId": booking.showtime_id,
                        "reason": "PAYMENT_FAILED",
                    }),
                )
                .await;
        }

        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))
    }

    /// Explicit cancellation by the owner or an admin. Only pending
    /// bookings can be cancelled this way.
    pub async fn cancel(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, CoreError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;
        if !actor.can_manage(&booking.user_id) {
            return Err(CoreError::Forbidden);
        }
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: booking.status.as_str().into(),
                to: BookingStatus::Cancelled.as_str().into(),
            });
        }

        let won = self
            .bookings
            .mark_cancelled(booking_id, booking.payment_state)
            .await?;
        if !won {
            let current = self
                .bookings
                .get(booking_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;
            return Err(CoreError::InvalidTransition {
                from: current.status.as_str().into(),
                to: BookingStatus::Cancelled.as_str().into(),
            });
        }

        self.release_quietly(booking.showtime_id, &booking.seat_ids, booking.id)
            .await;
        tracing::info!(booking_id = %booking.id, "booking cancelled");
        self.notifier
            .notify(
                &booking.user_id,
                NotificationKind::BookingCancelled,
                serde_json::json!({
                    "bookingId": booking.id,
                    "showtimeId": booking.showtime_id,
                    "reason": "CANCELLED_BY_USER",
                }),
            )
            .await;

        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))
    }

    /// Cancel every pending booking older than the window and free its
    /// seats. Races with a concurrent confirmation resolve through the
    /// compare-and-set: whoever moves the booking first wins, the other
    /// side is a no-op.
    pub async fn expire_pending(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<usize, CoreError> {
        let cutoff = now - window;
        let mut expired = 0;
        for booking in self.bookings.pending_created_before(cutoff).await? {
            // Same terminal state as a failed payment: the customer never
            // completed the purchase.
            let won = self
                .bookings
                .mark_cancelled(booking.id, PaymentState::Failed)
                .await?;
            if !won {
                continue;
            }
            self.release_quietly(booking.showtime_id, &booking.seat_ids, booking.id)
                .await;
            tracing::info!(booking_id = %booking.id, "pending booking expired");
            self.notifier
                .notify(
                    &booking.user_id,
                    NotificationKind::BookingCancelled,
                    serde_json::json!({
                        "bookingId": booking.id,
                        "showtimeId": booking.showtime_id,
                        "reason": "EXPIRED",
                    }),
                )
                .await;
            expired += 1;
        }
        Ok(expired)
    }

    /// Record the gateway order reference once payment has been initiated.
    pub async fn attach_transaction_ref(
        &self,
        booking_id: Uuid,
        transaction_ref: &str,
    ) -> Result<(), CoreError> {
        self.bookings
            .set_transaction_ref(booking_id, transaction_ref)
            .await
    }

    async fn release_quietly(&self, showtime_id: Uuid, seat_ids: &[Uuid], token: Uuid) {
        if let Err(err) = self.locks.release(showtime_id, seat_ids, token).await {
            tracing::error!(%showtime_id, error = %err, "seat release failed");
        }
    }
}
