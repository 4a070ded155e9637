use crate::models::{Promotion, PromotionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PromoError {
    #[error("promotion code not found")]
    NotFound,

    #[error("promotion is not active")]
    NotActive,

    #[error("promotion usage limit reached")]
    UsageLimitReached,

    #[error("order total is below the promotion minimum")]
    BelowMinimumPurchase,

    #[error("promotion does not apply to this movie or cinema")]
    NotApplicable,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<PromoError> for CoreError {
    fn from(err: PromoError) -> Self {
        match err {
            PromoError::Storage(msg) => CoreError::Storage(msg),
            other => CoreError::PromotionInvalid(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn insert(&self, promotion: &Promotion) -> Result<(), PromoError>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Promotion>, PromoError>;

    async fn list(&self) -> Result<Vec<Promotion>, PromoError>;

    async fn set_status(&self, id: Uuid, status: PromotionStatus) -> Result<(), PromoError>;

    /// Conditional single-step increment of `usage_count`, guarded by
    /// `usage_count < usage_limit`. Returns false when the limit was
    /// already reached; concurrent confirmations can never oversell a
    /// capped promotion.
    async fn try_consume(&self, code: &str) -> Result<bool, PromoError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub base_amount: i64,
    pub discount: i64,
    pub total: i64,
    pub promotion_code: Option<String>,
}

impl Quote {
    fn without_promotion(base_amount: i64) -> Self {
        Self {
            base_amount,
            discount: 0,
            total: base_amount,
            promotion_code: None,
        }
    }
}

/// Computes booking totals and owns promotion eligibility. Usage is only
/// consumed at confirmation time, never while a booking is still pending.
pub struct PromotionEngine {
    repo: std::sync::Arc<dyn PromotionRepository>,
}

impl PromotionEngine {
    pub fn new(repo: std::sync::Arc<dyn PromotionRepository>) -> Self {
        Self { repo }
    }

    /// Total for a set of seat prices with an optional promotion code.
    /// An invalid code rejects the quote; callers decide whether to retry
    /// without the code.
    pub async fn quote(
        &self,
        seat_prices: &[i64],
        promotion_code: Option<&str>,
        movie_id: Uuid,
        cinema_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Quote, PromoError> {
        let base_amount: i64 = seat_prices.iter().sum();

        let code = match promotion_code {
            Some(code) if !code.trim().is_empty() => code.trim().to_uppercase(),
            _ => return Ok(Quote::without_promotion(base_amount)),
        };

        let promotion = self
            .repo
            .get_by_code(&code)
            .await?
            .ok_or(PromoError::NotFound)?;

        if promotion.derived_status(now) != PromotionStatus::Active {
            return Err(PromoError::NotActive);
        }
        if promotion.usage_exhausted() {
            return Err(PromoError::UsageLimitReached);
        }
        if let Some(min) = promotion.min_purchase_amount {
            if base_amount < min {
                return Err(PromoError::BelowMinimumPurchase);
            }
        }
        if !promotion.applies_to(movie_id, cinema_id) {
            return Err(PromoError::NotApplicable);
        }

        let discount = promotion.discount_for(base_amount);
        Ok(Quote {
            base_amount,
            discount,
            total: base_amount - discount,
            promotion_code: Some(code),
        })
    }

    /// Consume one use at booking confirmation. Returns whether the
    /// counter was incremented; a false return is surfaced to the caller
    /// as degraded, never as a booking failure.
    pub async fn commit_usage(&self, code: &str) -> Result<bool, PromoError> {
        self.repo.try_consume(&code.trim().to_uppercase()).await
    }
}

/// In-memory promotion store for tests and single-process deployments.
pub struct MemoryPromotionRepository {
    inner: Mutex<HashMap<String, Promotion>>,
}

impl MemoryPromotionRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPromotionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromotionRepository for MemoryPromotionRepository {
    async fn insert(&self, promotion: &Promotion) -> Result<(), PromoError> {
        let mut map = self.inner.lock().unwrap();
        map.insert(promotion.code.clone(), promotion.clone());
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Promotion>, PromoError> {
        let map = self.inner.lock().unwrap();
        Ok(map.get(code).cloned())
    }

    async fn list(&self) -> Result<Vec<Promotion>, PromoError> {
        let map = self.inner.lock().unwrap();
        Ok(map.values().cloned().collect())
    }

    async fn set_status(&self, id: Uuid, status: PromotionStatus) -> Result<(), PromoError> {
        let mut map = self.inner.lock().unwrap();
        for promotion in map.values_mut() {
            if promotion.id == id {
                promotion.status = status;
            }
        }
        Ok(())
    }

    async fn try_consume(&self, code: &str) -> Result<bool, PromoError> {
        // Single critical section = the conditional increment
        let mut map = self.inner.lock().unwrap();
        let promotion = map.get_mut(code).ok_or(PromoError::NotFound)?;
        if promotion.usage_exhausted() {
            return Ok(false);
        }
        promotion.usage_count += 1;
        Ok(true)
    }
}
