//! Clock-anchored markers for the daily cycle.

pub mod scheduler;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

/// Points in the day at which the bot checks in on the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Pre-close nudge while under quorum.
    Reminder,
    /// First intermediate check with the current line-up.
    FollowUp,
    /// Second intermediate check; pings everyone who deferred.
    DeferredCall,
    /// Closes the day: cancels if quorum was never reached.
    Final,
}

impl Marker {
    pub const ALL: [Marker; 4] = [Marker::Reminder, Marker::FollowUp, Marker::DeferredCall, Marker::Final];

    pub fn name(&self) -> &'static str {
        match self {
            Marker::Reminder => "reminder",
            Marker::FollowUp => "follow-up",
            Marker::DeferredCall => "deferred-call",
            Marker::Final => "final",
        }
    }
}

/// Local clock times for the poll and each marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSchedule {
    pub poll_at: NaiveTime,
    pub reminder_at: NaiveTime,
    pub follow_up_at: NaiveTime,
    pub deferred_call_at: NaiveTime,
    pub final_at: NaiveTime,
}

impl Default for MarkerSchedule {
    fn default() -> Self {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            poll_at: at(12, 0),
            reminder_at: at(18, 0),
            follow_up_at: at(20, 0),
            deferred_call_at: at(21, 0),
            final_at: at(21, 30),
        }
    }
}

impl MarkerSchedule {
    pub fn time_of(&self, marker: Marker) -> NaiveTime {
        match marker {
            Marker::Reminder => self.reminder_at,
            Marker::FollowUp => self.follow_up_at,
            Marker::DeferredCall => self.deferred_call_at,
            Marker::Final => self.final_at,
        }
    }
}

/// Next instant at which the local clock in `tz` reads `at`. A time already
/// reached today rolls over to tomorrow.
pub fn next_occurrence(now: DateTime<Utc>, tz: FixedOffset, at: NaiveTime) -> DateTime<Utc> {
    let local_now = now.with_timezone(&tz);
    let mut date = local_now.date_naive();
    if local_now.time() >= at {
        date += Duration::days(1);
    }
    // A fixed offset has no gaps, so the local time always maps to one instant.
    tz.from_local_datetime(&date.and_time(at))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}
