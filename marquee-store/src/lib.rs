pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod notifier;
pub mod promo_repo;
pub mod redis_repo;
pub mod showtime_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use notifier::BroadcastNotifier;
pub use promo_repo::PgPromotionRepository;
pub use redis_repo::RedisSeatLocks;
pub use showtime_repo::PgShowtimeRepository;
