use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_promo::engine::{PromoError, PromotionRepository};
use marquee_promo::models::{Promotion, PromotionKind, PromotionStatus};
use sqlx::PgPool;
use uuid::Uuid;

fn storage(err: sqlx::Error) -> PromoError {
    PromoError::Storage(err.to_string())
}

pub struct PgPromotionRepository {
    pool: PgPool,
}

impl PgPromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    code: String,
    name: String,
    kind: String,
    value: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: String,
    usage_limit: Option<i32>,
    usage_count: i32,
    min_purchase_amount: Option<i64>,
    max_discount_amount: Option<i64>,
    applicable_movies: Vec<Uuid>,
    applicable_cinemas: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

fn kind_str(kind: PromotionKind) -> &'static str {
    match kind {
        PromotionKind::Percentage => "PERCENTAGE",
        PromotionKind::Fixed => "FIXED",
        PromotionKind::Gift => "GIFT",
    }
}

fn status_str(status: PromotionStatus) -> &'static str {
    match status {
        PromotionStatus::Scheduled => "SCHEDULED",
        PromotionStatus::Active => "ACTIVE",
        PromotionStatus::Inactive => "INACTIVE",
    }
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = PromoError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "PERCENTAGE" => PromotionKind::Percentage,
            "FIXED" => PromotionKind::Fixed,
            "GIFT" => PromotionKind::Gift,
            other => return Err(PromoError::Storage(format!("unknown promotion kind {other}"))),
        };
        let status = match row.status.as_str() {
            "SCHEDULED" => PromotionStatus::Scheduled,
            "ACTIVE" => PromotionStatus::Active,
            "INACTIVE" => PromotionStatus::Inactive,
            other => {
                return Err(PromoError::Storage(format!(
                    "unknown promotion status {other}"
                )))
            }
        };
        Ok(Promotion {
            id: row.id,
            code: row.code,
            name: row.name,
            kind,
            value: row.value,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            status,
            usage_limit: row.usage_limit.map(|limit| limit as u32),
            usage_count: row.usage_count as u32,
            min_purchase_amount: row.min_purchase_amount,
            max_discount_amount: row.max_discount_amount,
            applicable_movies: row.applicable_movies,
            applicable_cinemas: row.applicable_cinemas,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PromotionRepository for PgPromotionRepository {
    async fn insert(&self, promotion: &Promotion) -> Result<(), PromoError> {
        sqlx::query(
            r#"
            INSERT INTO promotions
                (id, code, name, kind, value, starts_at, ends_at, status,
                 usage_limit, usage_count, min_purchase_amount, max_discount_amount,
                 applicable_movies, applicable_cinemas, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name, kind = EXCLUDED.kind, value = EXCLUDED.value,
                starts_at = EXCLUDED.starts_at, ends_at = EXCLUDED.ends_at,
                status = EXCLUDED.status, usage_limit = EXCLUDED.usage_limit,
                min_purchase_amount = EXCLUDED.min_purchase_amount,
                max_discount_amount = EXCLUDED.max_discount_amount,
                applicable_movies = EXCLUDED.applicable_movies,
                applicable_cinemas = EXCLUDED.applicable_cinemas
            "#,
        )
        .bind(promotion.id)
        .bind(&promotion.code)
        .bind(&promotion.name)
        .bind(kind_str(promotion.kind))
        .bind(promotion.value)
        .bind(promotion.starts_at)
        .bind(promotion.ends_at)
        .bind(status_str(promotion.status))
        .bind(promotion.usage_limit.map(|limit| limit as i32))
        .bind(promotion.usage_count as i32)
        .bind(promotion.min_purchase_amount)
        .bind(promotion.max_discount_amount)
        .bind(&promotion.applicable_movies)
        .bind(&promotion.applicable_cinemas)
        .bind(promotion.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Promotion>, PromoError> {
        let row: Option<PromotionRow> =
            sqlx::query_as("SELECT * FROM promotions WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        row.map(Promotion::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Promotion>, PromoError> {
        let rows: Vec<PromotionRow> = sqlx::query_as("SELECT * FROM promotions")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.into_iter().map(Promotion::try_from).collect()
    }

    async fn set_status(&self, id: Uuid, status: PromotionStatus) -> Result<(), PromoError> {
        sqlx::query("UPDATE promotions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status_str(status))
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn try_consume(&self, code: &str) -> Result<bool, PromoError> {
        // Guarded single-statement increment; the row count is the verdict.
        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET usage_count = usage_count + 1
            WHERE code = $1
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            "#,
        )
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() == 1)
    }
}
