use crate::manager::BookingManager;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Periodic sweep that expires pending bookings nobody paid for. Runs until
/// the process shuts down; each pass is independent, so a failed pass only
/// logs and the next interval retries.
pub async fn run_sweeper(
    manager: Arc<BookingManager>,
    expiry_window: Duration,
    interval_seconds: u64,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
    loop {
        ticker.tick().await;
        match manager.expire_pending(Utc::now(), expiry_window).await {
            Ok(0) => {}
            Ok(expired) => tracing::info!(expired, "expiry sweep released stale bookings"),
            Err(err) => tracing::error!(error = %err, "expiry sweep failed"),
        }
    }
}
