use askama::Template;

use crate::models::game_session::AggregateStats;
use crate::models::player::PlayerStats;

use super::percent;

/// One line of a stats listing, numbers already formatted.
#[derive(Debug, Clone)]
pub struct StatsRow {
    pub name: String,
    pub total: i32,
    pub positive: i32,
    pub rate: String,
}

impl From<&PlayerStats> for StatsRow {
    fn from(s: &PlayerStats) -> Self {
        StatsRow {
            name: s.display_name(),
            total: s.total_votes,
            positive: s.positive_votes,
            rate: percent(s.participation_rate()),
        }
    }
}

#[derive(Template)]
#[template(path = "messages/player_stats.html")]
pub struct PlayerStatsTemplate {
    pub name: String,
    pub stats: Option<StatsRow>,
}

#[derive(Template)]
#[template(path = "messages/top_players.html")]
pub struct TopPlayersTemplate {
    pub rows: Vec<StatsRow>,
}

#[derive(Template)]
#[template(path = "messages/game_stats.html")]
pub struct GameStatsTemplate {
    pub total: i64,
    pub confirmed: i64,
    pub rate: String,
}

impl From<AggregateStats> for GameStatsTemplate {
    fn from(s: AggregateStats) -> Self {
        GameStatsTemplate {
            total: s.total_sessions,
            confirmed: s.confirmed_sessions,
            rate: percent(s.success_rate()),
        }
    }
}

#[derive(Template)]
#[template(path = "messages/help.html")]
pub struct HelpTemplate;

#[derive(Template)]
#[template(path = "messages/server.html")]
pub struct ServerTemplate {
    pub url: String,
}

#[derive(Template)]
#[template(path = "messages/admin_status.html")]
pub struct AdminStatusTemplate {
    pub epoch: u64,
    pub offline: bool,
    pub committed: usize,
    pub threshold: usize,
    pub confirmed: bool,
    pub deferred: usize,
    pub declined: usize,
    pub map_stage: &'static str,
    pub maps: Option<(String, String)>,
    pub sessions: AggregateStats,
}
