use std::fmt;
use std::str::FromStr;

/// Lifecycle of the day's session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Things that move a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    QuorumReached,
    QuorumLost,
    /// The final marker fired; `quorum_held` tells whether enough players were in.
    Closed { quorum_held: bool },
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Next status. Cancelled is terminal.
    pub fn apply(self, event: SessionEvent) -> SessionStatus {
        match (self, event) {
            (SessionStatus::Cancelled, _) => SessionStatus::Cancelled,
            (_, SessionEvent::QuorumReached) => SessionStatus::Confirmed,
            (_, SessionEvent::QuorumLost) => SessionStatus::Pending,
            (_, SessionEvent::Closed { quorum_held: true }) => SessionStatus::Confirmed,
            (_, SessionEvent::Closed { quorum_held: false }) => SessionStatus::Cancelled,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Fields written back to a session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: SessionStatus,
    pub start_time: Option<String>,
    pub player_count: i32,
}

/// Totals across all recorded sessions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateStats {
    pub total_sessions: i64,
    pub confirmed_sessions: i64,
}

impl AggregateStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            0.0
        } else {
            self.confirmed_sessions as f64 / self.total_sessions as f64 * 100.0
        }
    }
}
