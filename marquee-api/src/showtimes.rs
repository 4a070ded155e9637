use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use marquee_catalog::{Seat, SeatKind, SeatLockStore, Showtime, ShowtimeRepository};
use marquee_core::CoreError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_showtime))
        .route("/{id}/seats", get(list_seats))
        .route("/{id}/events", get(showtime_events))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/showtimes", post(schedule_showtime))
        .route("/rooms/{id}/seats", post(add_seats))
        .route("/rooms/{id}", delete(delete_room))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    movie_id: Uuid,
    cinema_id: Uuid,
    room_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    base_price: i64,
}

async fn schedule_showtime(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<Showtime>, ApiError> {
    let showtime = Showtime::new(
        req.movie_id,
        req.cinema_id,
        req.room_id,
        req.starts_at,
        req.ends_at,
        req.base_price,
    )
    .map_err(CoreError::from)?;
    state
        .showtimes
        .schedule(&showtime)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(showtime))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Showtime>, ApiError> {
    let showtime = state
        .showtimes
        .get_showtime(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::NotFound(format!("showtime {id}")))?;
    Ok(Json(showtime))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatAvailability {
    #[serde(flatten)]
    seat: Seat,
    available: bool,
}

/// Room layout plus live availability against the seat-lock table.
async fn list_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SeatAvailability>>, ApiError> {
    let showtime = state
        .showtimes
        .get_showtime(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::NotFound(format!("showtime {id}")))?;

    let seats = state
        .showtimes
        .seats_in_room(showtime.room_id)
        .await
        .map_err(CoreError::from)?;
    let held = state.locks.held_seats(id).await.map_err(CoreError::from)?;

    Ok(Json(
        seats
            .into_iter()
            .map(|seat| SeatAvailability {
                available: !held.contains(&seat.id),
                seat,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddSeatRequest {
    row: u32,
    column: u32,
    kind: SeatKind,
    price: i64,
}

async fn add_seats(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<Vec<AddSeatRequest>>,
) -> Result<Json<Vec<Seat>>, ApiError> {
    let seats: Vec<Seat> = req
        .into_iter()
        .map(|seat| Seat::new(room_id, seat.row, seat.column, seat.kind, seat.price))
        .collect();
    state
        .showtimes
        .add_seats(&seats)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(seats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRoomResponse {
    removed_showtimes: Vec<Uuid>,
}

/// Remove a room with its seats and showtimes, then drop every seat lock
/// of the removed showtimes so nothing stays reserved for a show that no
/// longer exists.
async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<DeleteRoomResponse>, ApiError> {
    let removed = state
        .showtimes
        .delete_room(room_id)
        .await
        .map_err(CoreError::from)?;
    for showtime_id in &removed {
        state
            .locks
            .purge_showtime(*showtime_id)
            .await
            .map_err(CoreError::from)?;
    }
    Ok(Json(DeleteRoomResponse {
        removed_showtimes: removed,
    }))
}

/// Booking events scoped to one showtime, pushed to storefront clients so
/// seat maps update without polling.
async fn showtime_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event)
                if event.payload.get("showtimeId").and_then(|v| v.as_str())
                    == Some(id.to_string().as_str()) =>
            {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event(event.kind.clone()).data(data)))
            }
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
