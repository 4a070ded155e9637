pub mod inventory;
pub mod showtime;

pub use inventory::{InventoryError, MemorySeatLocks, SeatLockStore};
pub use showtime::{
    MemoryShowtimeCatalog, Seat, SeatKind, Showtime, ShowtimeRepository, ShowtimeStatus,
};
