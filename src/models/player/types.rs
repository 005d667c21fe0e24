use chrono::{DateTime, Utc};

/// Attendance statistics for one player.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlayerStats {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub total_votes: i32,
    pub positive_votes: i32,
    pub last_vote_at: Option<DateTime<Utc>>,
}

impl PlayerStats {
    /// Share of votes that were a yes, in percent.
    pub fn participation_rate(&self) -> f64 {
        if self.total_votes == 0 {
            0.0
        } else {
            f64::from(self.positive_votes) / f64::from(self.total_votes) * 100.0
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.username) {
            (Some(first), _) if !first.is_empty() => first.clone(),
            (_, Some(user)) if !user.is_empty() => format!("@{user}"),
            _ => format!("player {}", self.id),
        }
    }
}
