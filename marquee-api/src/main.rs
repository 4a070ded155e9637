use marquee_api::{app, state::AuthConfig, worker, AppState};
use marquee_booking::BookingManager;
use marquee_pay::{CallbackVerifier, MomoConfig, MomoGateway};
use marquee_promo::PromotionEngine;
use marquee_store::{
    BroadcastNotifier, DbClient, PgBookingRepository, PgPromotionRepository, PgShowtimeRepository,
    RedisSeatLocks,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let locks = Arc::new(
        RedisSeatLocks::connect(&config.redis.url, config.business_rules.seat_hold_ttl_seconds())
            .await
            .expect("Failed to connect to Redis"),
    );

    let bookings = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let showtimes = Arc::new(PgShowtimeRepository::new(db.pool.clone()));
    let promo_repo = Arc::new(PgPromotionRepository::new(db.pool.clone()));
    let promotions = Arc::new(PromotionEngine::new(promo_repo.clone()));

    let notifier = BroadcastNotifier::new(100);
    let events = notifier.sender();

    let manager = Arc::new(BookingManager::new(
        bookings.clone(),
        showtimes.clone(),
        locks.clone(),
        promotions.clone(),
        Arc::new(notifier),
    ));

    let gateway = Arc::new(MomoGateway::new(MomoConfig {
        partner_code: config.payment.partner_code.clone(),
        access_key: config.payment.access_key.clone(),
        secret_key: config.payment.secret_key.clone(),
        endpoint: config.payment.endpoint.clone(),
        redirect_url: config.payment.redirect_url.clone(),
        ipn_url: config.payment.ipn_url.clone(),
    }));
    let verifier = CallbackVerifier::new(
        config.payment.access_key.clone(),
        config.payment.secret_key.clone(),
    );

    let state = AppState {
        manager,
        bookings,
        showtimes,
        locks,
        promotions,
        promo_repo,
        gateway,
        verifier,
        events,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    worker::spawn_workers(&state);

    let app = app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
