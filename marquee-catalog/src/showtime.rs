use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatKind {
    Standard,
    Vip,
}

/// A physical seat in a room. Per-showtime booked state is never stored
/// here; it is derived from the seat-lock table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: Uuid,
    pub room_id: Uuid,
    pub row: u32,
    pub column: u32,
    pub kind: SeatKind,
    pub price: i64,
}

impl Seat {
    pub fn new(room_id: Uuid, row: u32, column: u32, kind: SeatKind, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            row,
            column,
            kind,
            price,
        }
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.row, self.column)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShowtimeStatus {
    Scheduled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub cinema_id: Uuid,
    pub room_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub base_price: i64,
    pub status: ShowtimeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    /// Validating constructor: replaces the implicit pre-save hooks of a
    /// schema layer with explicit checks at construction time.
    pub fn new(
        movie_id: Uuid,
        cinema_id: Uuid,
        room_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        base_price: i64,
    ) -> Result<Self, CatalogError> {
        if ends_at <= starts_at {
            return Err(CatalogError::InvalidWindow);
        }
        if base_price < 0 {
            return Err(CatalogError::InvalidPrice);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            movie_id,
            cinema_id,
            room_id,
            starts_at,
            ends_at,
            base_price,
            status: ShowtimeStatus::Scheduled,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_bookable(&self) -> bool {
        self.status == ShowtimeStatus::Scheduled
    }

    /// Half-open interval overlap against another showtime in the same room.
    pub fn overlaps(&self, other: &Showtime) -> bool {
        self.room_id == other.room_id
            && other.status != ShowtimeStatus::Cancelled
            && self.starts_at < other.ends_at
            && other.starts_at < self.ends_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("showtime not found: {0}")]
    ShowtimeNotFound(Uuid),

    #[error("seat not found: {0}")]
    SeatNotFound(Uuid),

    #[error("showtime overlaps an existing showtime {0} in the same room")]
    Overlap(Uuid),

    #[error("seat does not belong to the showtime's room")]
    RoomMismatch,

    #[error("showtime must end after it starts")]
    InvalidWindow,

    #[error("price must not be negative")]
    InvalidPrice,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ShowtimeNotFound(id) => CoreError::NotFound(format!("showtime {id}")),
            CatalogError::SeatNotFound(id) => CoreError::NotFound(format!("seat {id}")),
            CatalogError::Overlap(_) => CoreError::ShowtimeUnavailable,
            CatalogError::RoomMismatch
            | CatalogError::InvalidWindow
            | CatalogError::InvalidPrice => CoreError::Validation(err.to_string()),
            CatalogError::Storage(msg) => CoreError::Storage(msg),
        }
    }
}

/// Repository seam for showtime and seat data.
#[async_trait]
pub trait ShowtimeRepository: Send + Sync {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError>;

    /// Insert after rejecting any overlap with a non-cancelled showtime in
    /// the same room.
    async fn schedule(&self, showtime: &Showtime) -> Result<(), CatalogError>;

    async fn set_status(&self, id: Uuid, status: ShowtimeStatus) -> Result<(), CatalogError>;

    async fn add_seats(&self, seats: &[Seat]) -> Result<(), CatalogError>;

    /// Fetch seats by id; errors when any id is unknown.
    async fn seats_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Seat>, CatalogError>;

    async fn seats_in_room(&self, room_id: Uuid) -> Result<Vec<Seat>, CatalogError>;

    /// Explicit cascade: remove the room's seats and showtimes, returning
    /// the removed showtime ids so the caller can purge their seat locks.
    async fn delete_room(&self, room_id: Uuid) -> Result<Vec<Uuid>, CatalogError>;
}

/// In-memory catalog used by tests and single-process deployments.
pub struct MemoryShowtimeCatalog {
    inner: Mutex<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    showtimes: HashMap<Uuid, Showtime>,
    seats: HashMap<Uuid, Seat>,
}

impl MemoryShowtimeCatalog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CatalogState::default()),
        }
    }
}

impl Default for MemoryShowtimeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShowtimeRepository for MemoryShowtimeCatalog {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
        let state = self.inner.lock().unwrap();
        Ok(state.showtimes.get(&id).cloned())
    }

    async fn schedule(&self, showtime: &Showtime) -> Result<(), CatalogError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state
            .showtimes
            .values()
            .find(|existing| showtime.overlaps(existing))
        {
            return Err(CatalogError::Overlap(existing.id));
        }
        state.showtimes.insert(showtime.id, showtime.clone());
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ShowtimeStatus) -> Result<(), CatalogError> {
        let mut state = self.inner.lock().unwrap();
        let showtime = state
            .showtimes
            .get_mut(&id)
            .ok_or(CatalogError::ShowtimeNotFound(id))?;
        showtime.status = status;
        showtime.updated_at = Utc::now();
        Ok(())
    }

    async fn add_seats(&self, seats: &[Seat]) -> Result<(), CatalogError> {
        let mut state = self.inner.lock().unwrap();
        for seat in seats {
            state.seats.insert(seat.id, seat.clone());
        }
        Ok(())
    }

    async fn seats_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Seat>, CatalogError> {
        let state = self.inner.lock().unwrap();
        ids.iter()
            .map(|id| {
                state
                    .seats
                    .get(id)
                    .cloned()
                    .ok_or(CatalogError::SeatNotFound(*id))
            })
            .collect()
    }

    async fn seats_in_room(&self, room_id: Uuid) -> Result<Vec<Seat>, CatalogError> {
        let state = self.inner.lock().unwrap();
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|seat| seat.room_id == room_id)
            .cloned()
            .collect();
        seats.sort_by_key(|seat| (seat.row, seat.column));
        Ok(seats)
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<Vec<Uuid>, CatalogError> {
        let mut state = self.inner.lock().unwrap();
        state.seats.retain(|_, seat| seat.room_id != room_id);
        let removed: Vec<Uuid> = state
            .showtimes
            .values()
            .filter(|showtime| showtime.room_id == room_id)
            .map(|showtime| showtime.id)
            .collect();
        for id in &removed {
            state.showtimes.remove(id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn showtime_in(room_id: Uuid, offset_hours: i64, length_hours: i64) -> Showtime {
        let starts = Utc::now() + Duration::hours(offset_hours);
        Showtime::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            room_id,
            starts,
            starts + Duration::hours(length_hours),
            1000,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn overlapping_showtimes_rejected() {
        let catalog = MemoryShowtimeCatalog::new();
        let room = Uuid::new_v4();

        catalog.schedule(&showtime_in(room, 1, 2)).await.unwrap();

        // Overlaps the first by an hour
        let result = catalog.schedule(&showtime_in(room, 2, 2)).await;
        assert!(matches!(result, Err(CatalogError::Overlap(_))));

        // Back to back is fine
        catalog.schedule(&showtime_in(room, 3, 2)).await.unwrap();

        // Same window in a different room is fine
        let other_room = Uuid::new_v4();
        catalog
            .schedule(&showtime_in(other_room, 1, 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_showtime_does_not_block_the_slot() {
        let catalog = MemoryShowtimeCatalog::new();
        let room = Uuid::new_v4();

        let first = showtime_in(room, 1, 2);
        catalog.schedule(&first).await.unwrap();
        catalog
            .set_status(first.id, ShowtimeStatus::Cancelled)
            .await
            .unwrap();

        catalog.schedule(&showtime_in(room, 1, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_room_cascades_to_showtimes_and_seats() {
        let catalog = MemoryShowtimeCatalog::new();
        let room = Uuid::new_v4();

        let seat = Seat::new(room, 1, 1, SeatKind::Standard, 1000);
        catalog.add_seats(&[seat.clone()]).await.unwrap();
        let showtime = showtime_in(room, 1, 2);
        catalog.schedule(&showtime).await.unwrap();

        let removed = catalog.delete_room(room).await.unwrap();
        assert_eq!(removed, vec![showtime.id]);
        assert!(catalog.get_showtime(showtime.id).await.unwrap().is_none());
        assert!(catalog.seats_by_ids(&[seat.id]).await.is_err());
    }

    #[test]
    fn constructor_rejects_inverted_window() {
        let now = Utc::now();
        let result = Showtime::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
            now - Duration::hours(1),
            1000,
        );
        assert!(matches!(result, Err(CatalogError::InvalidWindow)));
    }
}
