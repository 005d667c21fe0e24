use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::types::PlayerStats;
use crate::voting::Participant;

/// Count one vote for the player, creating the row on first sight.
pub async fn record_vote(pool: &PgPool, participant: &Participant, positive: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO players (id, username, first_name, total_votes, positive_votes, last_vote_at) \
         VALUES ($1, $2, $3, 1, $4, NOW()) \
         ON CONFLICT (id) DO UPDATE SET \
             username = EXCLUDED.username, \
             first_name = EXCLUDED.first_name, \
             total_votes = players.total_votes + 1, \
             positive_votes = players.positive_votes + EXCLUDED.positive_votes, \
             last_vote_at = NOW()",
    )
    .bind(participant.id)
    .bind(&participant.username)
    .bind(&participant.first_name)
    .bind(if positive { 1_i32 } else { 0_i32 })
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
    sqlx::query_as::<_, PlayerStats>(
        "SELECT id, username, first_name, total_votes, positive_votes, last_vote_at \
         FROM players WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Most active players by votes, then by yes votes.
pub async fn find_top(pool: &PgPool, limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error> {
    sqlx::query_as::<_, PlayerStats>(
        "SELECT id, username, first_name, total_votes, positive_votes, last_vote_at \
         FROM players \
         ORDER BY total_votes DESC, positive_votes DESC, id \
         LIMIT $1",
    )
    .bind(limit.clamp(1, 50))
    .fetch_all(pool)
    .await
}

/// Remember when a player last picked the maps.
pub async fn mark_selected(pool: &PgPool, participant: &Participant, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO players (id, username, first_name, last_selected_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET last_selected_at = EXCLUDED.last_selected_at",
    )
    .bind(participant.id)
    .bind(&participant.username)
    .bind(&participant.first_name)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn selection_history(pool: &PgPool) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        "SELECT id, last_selected_at FROM players WHERE last_selected_at IS NOT NULL",
    )
    .fetch_all(pool)
    .await
}
