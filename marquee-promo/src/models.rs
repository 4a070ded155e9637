use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionKind {
    Percentage,
    Fixed,
    Gift,
}

/// Cached lifecycle status; authoritative value is always derived from the
/// date window, see [`Promotion::derived_status`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    Scheduled,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: PromotionKind,
    pub value: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: PromotionStatus,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub min_purchase_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    /// Empty list means the promotion applies to every movie.
    pub applicable_movies: Vec<Uuid>,
    /// Empty list means the promotion applies to every cinema.
    pub applicable_cinemas: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PromotionDefinitionError {
    #[error("promotion must end after it starts")]
    InvalidWindow,

    #[error("promotion value must not be negative")]
    InvalidValue,
}

impl Promotion {
    /// Validating constructor; codes are stored uppercase.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: PromotionKind,
        value: i64,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<Self, PromotionDefinitionError> {
        if ends_at <= starts_at {
            return Err(PromotionDefinitionError::InvalidWindow);
        }
        if value < 0 {
            return Err(PromotionDefinitionError::InvalidValue);
        }
        let now = Utc::now();
        let mut promotion = Self {
            id: Uuid::new_v4(),
            code: code.into().trim().to_uppercase(),
            name: name.into(),
            kind,
            value,
            starts_at,
            ends_at,
            status: PromotionStatus::Scheduled,
            usage_limit: None,
            usage_count: 0,
            min_purchase_amount: None,
            max_discount_amount: None,
            applicable_movies: Vec::new(),
            applicable_cinemas: Vec::new(),
            created_at: now,
        };
        promotion.status = promotion.derived_status(now);
        Ok(promotion)
    }

    pub fn with_usage_limit(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    pub fn with_min_purchase(mut self, amount: i64) -> Self {
        self.min_purchase_amount = Some(amount);
        self
    }

    pub fn with_max_discount(mut self, amount: i64) -> Self {
        self.max_discount_amount = Some(amount);
        self
    }

    /// Status as a pure function of the date window.
    pub fn derived_status(&self, now: DateTime<Utc>) -> PromotionStatus {
        if now < self.starts_at {
            PromotionStatus::Scheduled
        } else if now < self.ends_at {
            PromotionStatus::Active
        } else {
            PromotionStatus::Inactive
        }
    }

    pub fn usage_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.usage_count >= limit)
            .unwrap_or(false)
    }

    pub fn applies_to(&self, movie_id: Uuid, cinema_id: Uuid) -> bool {
        let movie_ok =
            self.applicable_movies.is_empty() || self.applicable_movies.contains(&movie_id);
        let cinema_ok =
            self.applicable_cinemas.is_empty() || self.applicable_cinemas.contains(&cinema_id);
        movie_ok && cinema_ok
    }

    /// Discount for a base amount. Percentage discounts are capped by
    /// `max_discount_amount`; every discount is capped at the base amount
    /// so the total never goes negative. Gift promotions carry no monetary
    /// discount.
    pub fn discount_for(&self, base_amount: i64) -> i64 {
        let raw = match self.kind {
            PromotionKind::Percentage => {
                let pct = base_amount * self.value / 100;
                match self.max_discount_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            PromotionKind::Fixed => self.value,
            PromotionKind::Gift => 0,
        };
        raw.min(base_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn percentage(value: i64) -> Promotion {
        let now = Utc::now();
        Promotion::new(
            "save10",
            "Ten percent off",
            PromotionKind::Percentage,
            value,
            now - Duration::days(1),
            now + Duration::days(1),
        )
        .unwrap()
    }

    #[test]
    fn codes_are_normalised_uppercase() {
        assert_eq!(percentage(10).code, "SAVE10");
    }

    #[test]
    fn percentage_discount_capped_by_max_then_base() {
        let promo = percentage(10).with_max_discount(300);
        // base $25.00 -> 10% = $2.50, under the $3.00 cap
        assert_eq!(promo.discount_for(2500), 250);

        let promo = percentage(50).with_max_discount(300);
        // 50% of $25.00 = $12.50, capped at $3.00
        assert_eq!(promo.discount_for(2500), 300);
    }

    #[test]
    fn fixed_discount_never_exceeds_base() {
        let now = Utc::now();
        let promo = Promotion::new(
            "FLAT",
            "Flat discount",
            PromotionKind::Fixed,
            5000,
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .unwrap();
        assert_eq!(promo.discount_for(2500), 2500);
    }

    #[test]
    fn status_derivation_follows_the_window() {
        let promo = percentage(10);
        assert_eq!(
            promo.derived_status(promo.starts_at - Duration::hours(1)),
            PromotionStatus::Scheduled
        );
        assert_eq!(
            promo.derived_status(promo.starts_at),
            PromotionStatus::Active
        );
        assert_eq!(
            promo.derived_status(promo.ends_at),
            PromotionStatus::Inactive
        );
    }

    #[test]
    fn applicability_lists_empty_means_all() {
        let mut promo = percentage(10);
        let movie = Uuid::new_v4();
        let cinema = Uuid::new_v4();
        assert!(promo.applies_to(movie, cinema));

        promo.applicable_movies = vec![Uuid::new_v4()];
        assert!(!promo.applies_to(movie, cinema));

        promo.applicable_movies = vec![movie];
        assert!(promo.applies_to(movie, cinema));
    }

    #[test]
    fn inverted_window_rejected() {
        let now = Utc::now();
        let result = Promotion::new(
            "BAD",
            "Bad window",
            PromotionKind::Fixed,
            100,
            now,
            now - Duration::hours(1),
        );
        assert!(matches!(
            result,
            Err(PromotionDefinitionError::InvalidWindow)
        ));
    }
}
