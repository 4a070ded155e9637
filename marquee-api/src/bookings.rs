use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use marquee_booking::{Booking, CreateBooking, PaymentMethod};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/{id}", get(get_booking).delete(cancel_booking))
        .route("/{id}/cancel", post(cancel_booking))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    showtime_id: Uuid,
    seat_ids: Vec<Uuid>,
    payment_method: PaymentMethod,
    promotion_code: Option<String>,
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let booking = state
        .manager
        .create(
            &claims.actor(),
            CreateBooking {
                showtime_id: req.showtime_id,
                seat_ids: req.seat_ids,
                payment_method: req.payment_method,
                promotion_code: req.promotion_code,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state.manager.list_for_user(&claims.sub).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.manager.get(&claims.actor(), id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.manager.cancel(&claims.actor(), id).await?;
    Ok(Json(booking))
}
