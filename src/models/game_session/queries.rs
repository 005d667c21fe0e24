use chrono::NaiveDate;
use sqlx::PgPool;

use super::types::{AggregateStats, SessionStatus, SessionUpdate};

/// Open the day's session in `pending` state. Returns the new row id.
pub async fn create(pool: &PgPool, date: NaiveDate) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO game_sessions (session_date, status) VALUES ($1, $2) RETURNING id",
    )
    .bind(date)
    .bind(SessionStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn update(pool: &PgPool, id: i64, update: &SessionUpdate) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE game_sessions \
         SET status = $2, start_time = COALESCE($3, start_time), player_count = $4 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.status.as_str())
    .bind(&update.start_time)
    .bind(update.player_count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn aggregate(pool: &PgPool) -> Result<AggregateStats, sqlx::Error> {
    let (total_sessions, confirmed_sessions): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'confirmed') FROM game_sessions",
    )
    .fetch_one(pool)
    .await?;
    Ok(AggregateStats { total_sessions, confirmed_sessions })
}
