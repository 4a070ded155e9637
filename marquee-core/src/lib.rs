pub mod error;
pub mod identity;
pub mod notify;
pub mod payment;

pub use error::CoreError;
pub use identity::{Actor, Role};
