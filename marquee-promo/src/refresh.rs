use crate::engine::{PromoError, PromotionRepository};
use chrono::{DateTime, Utc};

/// Recompute every cached promotion status from the clock. The periodic
/// worker calls this on an interval; tests call it directly with an
/// injected instant. Returns how many promotions changed status.
pub async fn refresh_statuses(
    repo: &dyn PromotionRepository,
    now: DateTime<Utc>,
) -> Result<usize, PromoError> {
    let mut changed = 0;
    for promotion in repo.list().await? {
        let derived = promotion.derived_status(now);
        if derived != promotion.status {
            repo.set_status(promotion.id, derived).await?;
            changed += 1;
        }
    }
    Ok(changed)
}
