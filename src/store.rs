//! Stats persistence behind a trait, so the bot keeps running when the
//! database is unavailable.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::DbPool;
use crate::models::game_session::{self, AggregateStats, SessionUpdate};
use crate::models::player::{self, PlayerStats};
use crate::voting::Participant;

pub const RETRY_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

#[allow(async_fn_in_trait)]
pub trait StatsStore {
    async fn record_participation(&self, participant: &Participant, positive: bool) -> Result<(), sqlx::Error>;
    async fn create_session(&self, date: NaiveDate) -> Result<i64, sqlx::Error>;
    async fn update_session(&self, id: i64, update: &SessionUpdate) -> Result<(), sqlx::Error>;
    async fn aggregate_stats(&self) -> Result<AggregateStats, sqlx::Error>;
    async fn player_stats(&self, id: i64) -> Result<Option<PlayerStats>, sqlx::Error>;
    async fn top_players(&self, limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error>;
    async fn record_selection(&self, participant: &Participant, at: DateTime<Utc>) -> Result<(), sqlx::Error>;
    async fn selection_history(&self) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error>;

    /// True when running without a real backend.
    fn is_degraded(&self) -> bool {
        false
    }
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl StatsStore for PgStore {
    async fn record_participation(&self, participant: &Participant, positive: bool) -> Result<(), sqlx::Error> {
        player::record_vote(&self.pool, participant, positive).await
    }

    async fn create_session(&self, date: NaiveDate) -> Result<i64, sqlx::Error> {
        game_session::create(&self.pool, date).await
    }

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> Result<(), sqlx::Error> {
        game_session::update(&self.pool, id, update).await
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, sqlx::Error> {
        game_session::aggregate(&self.pool).await
    }

    async fn player_stats(&self, id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
        player::find_by_id(&self.pool, id).await
    }

    async fn top_players(&self, limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error> {
        player::find_top(&self.pool, limit).await
    }

    async fn record_selection(&self, participant: &Participant, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        player::mark_selected(&self.pool, participant, at).await
    }

    async fn selection_history(&self) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error> {
        player::selection_history(&self.pool).await
    }
}

/// Degraded mode: nothing is stored and every read comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

impl StatsStore for OfflineStore {
    fn is_degraded(&self) -> bool {
        true
    }

    async fn record_participation(&self, _participant: &Participant, _positive: bool) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn create_session(&self, _date: NaiveDate) -> Result<i64, sqlx::Error> {
        Ok(0)
    }

    async fn update_session(&self, _id: i64, _update: &SessionUpdate) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, sqlx::Error> {
        Ok(AggregateStats::default())
    }

    async fn player_stats(&self, _id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
        Ok(None)
    }

    async fn top_players(&self, _limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error> {
        Ok(Vec::new())
    }

    async fn record_selection(&self, _participant: &Participant, _at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn selection_history(&self) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error> {
        Ok(Vec::new())
    }
}

/// The store picked at startup.
#[derive(Debug, Clone)]
pub enum StatsBackend {
    Postgres(PgStore),
    Offline(OfflineStore),
}

impl StatsStore for StatsBackend {
    fn is_degraded(&self) -> bool {
        matches!(self, StatsBackend::Offline(_))
    }

    async fn record_participation(&self, participant: &Participant, positive: bool) -> Result<(), sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.record_participation(participant, positive).await,
            StatsBackend::Offline(s) => s.record_participation(participant, positive).await,
        }
    }

    async fn create_session(&self, date: NaiveDate) -> Result<i64, sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.create_session(date).await,
            StatsBackend::Offline(s) => s.create_session(date).await,
        }
    }

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> Result<(), sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.update_session(id, update).await,
            StatsBackend::Offline(s) => s.update_session(id, update).await,
        }
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.aggregate_stats().await,
            StatsBackend::Offline(s) => s.aggregate_stats().await,
        }
    }

    async fn player_stats(&self, id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.player_stats(id).await,
            StatsBackend::Offline(s) => s.player_stats(id).await,
        }
    }

    async fn top_players(&self, limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.top_players(limit).await,
            StatsBackend::Offline(s) => s.top_players(limit).await,
        }
    }

    async fn record_selection(&self, participant: &Participant, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.record_selection(participant, at).await,
            StatsBackend::Offline(s) => s.record_selection(participant, at).await,
        }
    }

    async fn selection_history(&self) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error> {
        match self {
            StatsBackend::Postgres(s) => s.selection_history().await,
            StatsBackend::Offline(s) => s.selection_history().await,
        }
    }
}

/// Run a store write up to `RETRY_ATTEMPTS` times with a fixed pause between
/// attempts. Gives up with `None` after logging.
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    for attempt in 1..=RETRY_ATTEMPTS {
        match op().await {
            Ok(value) => return Some(value),
            Err(e) => {
                log::warn!("{label} failed (attempt {attempt}/{RETRY_ATTEMPTS}): {e}");
                if attempt < RETRY_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
    log::error!("{label} abandoned after {RETRY_ATTEMPTS} attempts");
    None
}
