pub mod expiry;
pub mod manager;
pub mod models;

pub use manager::{BookingManager, CreateBooking};
pub use models::{
    Booking, BookingRepository, BookingStatus, MemoryBookingRepository, PaymentMethod,
    PaymentState,
};
