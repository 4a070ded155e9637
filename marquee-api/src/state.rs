use marquee_booking::{BookingManager, BookingRepository};
use marquee_catalog::{SeatLockStore, ShowtimeRepository};
use marquee_core::payment::PaymentGateway;
use marquee_pay::CallbackVerifier;
use marquee_promo::{PromotionEngine, PromotionRepository};
use marquee_shared::events::NotificationEvent;
use marquee_store::app_config::BusinessRules;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<BookingManager>,
    pub bookings: Arc<dyn BookingRepository>,
    pub showtimes: Arc<dyn ShowtimeRepository>,
    pub locks: Arc<dyn SeatLockStore>,
    pub promotions: Arc<PromotionEngine>,
    pub promo_repo: Arc<dyn PromotionRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: CallbackVerifier,
    pub events: broadcast::Sender<NotificationEvent>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
