use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_catalog::showtime::{
    CatalogError, Seat, SeatKind, Showtime, ShowtimeRepository, ShowtimeStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

fn storage(err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(err.to_string())
}

pub struct PgShowtimeRepository {
    pool: PgPool,
}

impl PgShowtimeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_id: Uuid,
    cinema_id: Uuid,
    room_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    base_price: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    room_id: Uuid,
    seat_row: i32,
    seat_column: i32,
    kind: String,
    price: i64,
}

fn status_str(status: ShowtimeStatus) -> &'static str {
    match status {
        ShowtimeStatus::Scheduled => "SCHEDULED",
        ShowtimeStatus::Cancelled => "CANCELLED",
        ShowtimeStatus::Completed => "COMPLETED",
    }
}

impl TryFrom<ShowtimeRow> for Showtime {
    type Error = CatalogError;

    fn try_from(row: ShowtimeRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "SCHEDULED" => ShowtimeStatus::Scheduled,
            "CANCELLED" => ShowtimeStatus::Cancelled,
            "COMPLETED" => ShowtimeStatus::Completed,
            other => {
                return Err(CatalogError::Storage(format!(
                    "unknown showtime status {other}"
                )))
            }
        };
        Ok(Showtime {
            id: row.id,
            movie_id: row.movie_id,
            cinema_id: row.cinema_id,
            room_id: row.room_id,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            base_price: row.base_price,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<SeatRow> for Seat {
    type Error = CatalogError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "STANDARD" => SeatKind::Standard,
            "VIP" => SeatKind::Vip,
            other => return Err(CatalogError::Storage(format!("unknown seat kind {other}"))),
        };
        Ok(Seat {
            id: row.id,
            room_id: row.room_id,
            row: row.seat_row as u32,
            column: row.seat_column as u32,
            kind,
            price: row.price,
        })
    }
}

#[async_trait]
impl ShowtimeRepository for PgShowtimeRepository {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
        let row: Option<ShowtimeRow> =
            sqlx::query_as("SELECT * FROM showtimes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        row.map(Showtime::try_from).transpose()
    }

    async fn schedule(&self, showtime: &Showtime) -> Result<(), CatalogError> {
        // Overlap check and insert in one transaction; the room rows are
        // serialized by the advisory lock so two concurrent schedules for
        // the same room cannot both pass the check.
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(showtime.room_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        let conflict: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM showtimes
            WHERE room_id = $1 AND status <> 'CANCELLED'
              AND starts_at < $3 AND $2 < ends_at
            LIMIT 1
            "#,
        )
        .bind(showtime.room_id)
        .bind(showtime.starts_at)
        .bind(showtime.ends_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        if let Some((existing,)) = conflict {
            return Err(CatalogError::Overlap(existing));
        }

        sqlx::query(
            r#"
            INSERT INTO showtimes
                (id, movie_id, cinema_id, room_id, starts_at, ends_at,
                 base_price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.cinema_id)
        .bind(showtime.room_id)
        .bind(showtime.starts_at)
        .bind(showtime.ends_at)
        .bind(showtime.base_price)
        .bind(status_str(showtime.status))
        .bind(showtime.created_at)
        .bind(showtime.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)
    }

    async fn set_status(&self, id: Uuid, status: ShowtimeStatus) -> Result<(), CatalogError> {
        let result =
            sqlx::query("UPDATE showtimes SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status_str(status))
                .execute(&self.pool)
                .await
                .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::ShowtimeNotFound(id));
        }
        Ok(())
    }

    async fn add_seats(&self, seats: &[Seat]) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        for seat in seats {
            sqlx::query(
                r#"
                INSERT INTO seats (id, room_id, seat_row, seat_column, kind, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(seat.id)
            .bind(seat.room_id)
            .bind(seat.row as i32)
            .bind(seat.column as i32)
            .bind(match seat.kind {
                SeatKind::Standard => "STANDARD",
                SeatKind::Vip => "VIP",
            })
            .bind(seat.price)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }
        tx.commit().await.map_err(storage)
    }

    async fn seats_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Seat>, CatalogError> {
        let rows: Vec<SeatRow> = sqlx::query_as("SELECT * FROM seats WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        if rows.len() != ids.len() {
            let found: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
            let missing = ids
                .iter()
                .find(|id| !found.contains(id))
                .copied()
                .unwrap_or_default();
            return Err(CatalogError::SeatNotFound(missing));
        }
        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn seats_in_room(&self, room_id: Uuid) -> Result<Vec<Seat>, CatalogError> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT * FROM seats WHERE room_id = $1 ORDER BY seat_row, seat_column",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<Vec<Uuid>, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let removed: Vec<(Uuid,)> =
            sqlx::query_as("DELETE FROM showtimes WHERE room_id = $1 RETURNING id")
                .bind(room_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(storage)?;

        sqlx::query("DELETE FROM seats WHERE room_id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(removed.into_iter().map(|(id,)| id).collect())
    }
}
