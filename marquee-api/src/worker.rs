use chrono::{Duration, Utc};
use marquee_booking::expiry::run_sweeper;
use marquee_promo::refresh_statuses;

use crate::state::AppState;

/// Spawn the background loops: the expiry sweep that cancels abandoned
/// pending bookings, and the promotion status refresh.
pub fn spawn_workers(state: &AppState) {
    let rules = state.business_rules.clone();

    let manager = state.manager.clone();
    tokio::spawn(async move {
        run_sweeper(
            manager,
            Duration::minutes(rules.booking_expiry_minutes),
            rules.sweep_interval_seconds,
        )
        .await;
    });

    let promo_repo = state.promo_repo.clone();
    let refresh_secs = state.business_rules.promo_refresh_seconds;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(refresh_secs));
        loop {
            ticker.tick().await;
            match refresh_statuses(promo_repo.as_ref(), Utc::now()).await {
                Ok(0) => {}
                Ok(changed) => tracing::info!(changed, "promotion statuses refreshed"),
                Err(err) => tracing::error!(error = %err, "promotion refresh failed"),
            }
        }
    });
}
