use async_trait::async_trait;
use marquee_core::CoreError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("seats already held: {taken:?}")]
    Conflict { taken: Vec<Uuid> },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Conflict { taken } => CoreError::SeatsUnavailable { taken },
            InventoryError::Storage(msg) => CoreError::Storage(msg),
        }
    }
}

/// Per-showtime seat reservation store.
///
/// `try_lock` is the single atomic check-and-reserve step: either every
/// requested seat is free and all become held under `token`, or nothing
/// changes and the conflict names the seats already taken. For two
/// concurrent attempts on overlapping seat sets exactly one wins.
#[async_trait]
pub trait SeatLockStore: Send + Sync {
    async fn try_lock(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError>;

    /// Idempotent: already-free seats are skipped, as are seats held under
    /// a different token or permanently confirmed.
    async fn release(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError>;

    /// Convert a hold into a permanent reservation once the booking
    /// confirms. Seats lost to another token in the meantime surface as a
    /// conflict.
    async fn confirm(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError>;

    async fn held_seats(&self, showtime_id: Uuid) -> Result<Vec<Uuid>, InventoryError>;

    /// Drop every lock for a showtime (cascade path when a room or
    /// showtime is deleted).
    async fn purge_showtime(&self, showtime_id: Uuid) -> Result<(), InventoryError>;
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    token: Uuid,
    confirmed: bool,
}

/// In-memory lock table. One mutex per store; the critical section is the
/// whole check-and-reserve, which is what makes the operation atomic.
pub struct MemorySeatLocks {
    inner: Mutex<HashMap<Uuid, HashMap<Uuid, Hold>>>,
}

impl MemorySeatLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemorySeatLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeatLockStore for MemorySeatLocks {
    async fn try_lock(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        let mut table = self.inner.lock().unwrap();
        let locks = table.entry(showtime_id).or_default();

        let mut taken: Vec<Uuid> = seat_ids
            .iter()
            .filter(|seat| {
                locks
                    .get(seat)
                    .map(|hold| hold.token != token)
                    .unwrap_or(false)
            })
            .copied()
            .collect();

        if !taken.is_empty() {
            taken.sort();
            return Err(InventoryError::Conflict { taken });
        }

        for seat in seat_ids {
            locks.entry(*seat).or_insert(Hold {
                token,
                confirmed: false,
            });
        }
        Ok(())
    }

    async fn release(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        let mut table = self.inner.lock().unwrap();
        if let Some(locks) = table.get_mut(&showtime_id) {
            for seat in seat_ids {
                if let Some(hold) = locks.get(seat) {
                    if hold.token == token && !hold.confirmed {
                        locks.remove(seat);
                    }
                }
            }
        }
        Ok(())
    }

    async fn confirm(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        let mut table = self.inner.lock().unwrap();
        let locks = table.entry(showtime_id).or_default();

        let mut taken: Vec<Uuid> = seat_ids
            .iter()
            .filter(|seat| {
                locks
                    .get(seat)
                    .map(|hold| hold.token != token)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        if !taken.is_empty() {
            taken.sort();
            return Err(InventoryError::Conflict { taken });
        }

        for seat in seat_ids {
            // Re-insert when the hold lapsed between payment and callback
            locks.insert(
                *seat,
                Hold {
                    token,
                    confirmed: true,
                },
            );
        }
        Ok(())
    }

    async fn held_seats(&self, showtime_id: Uuid) -> Result<Vec<Uuid>, InventoryError> {
        let table = self.inner.lock().unwrap();
        let mut seats: Vec<Uuid> = table
            .get(&showtime_id)
            .map(|locks| locks.keys().copied().collect())
            .unwrap_or_default();
        seats.sort();
        Ok(seats)
    }

    async fn purge_showtime(&self, showtime_id: Uuid) -> Result<(), InventoryError> {
        let mut table = self.inner.lock().unwrap();
        table.remove(&showtime_id);
        Ok(())
    }
}
