pub mod engine;
pub mod models;
pub mod refresh;

pub use engine::{MemoryPromotionRepository, PromoError, PromotionEngine, PromotionRepository, Quote};
pub use models::{Promotion, PromotionKind, PromotionStatus};
pub use refresh::refresh_statuses;
