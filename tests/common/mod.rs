//! Shared test infrastructure: in-memory stand-ins for the chat gateway and
//! the stats store, plus builders for participants, votes and the bot.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use squadcall::bot::Bot;
use squadcall::config::BotConfig;
use squadcall::gateway::{ChatId, GatewayError, MessageId, NotificationGateway, PollTally, SentPoll, TextFormat};
use squadcall::models::game_session::{AggregateStats, SessionStatus, SessionUpdate};
use squadcall::models::player::PlayerStats;
use squadcall::store::StatsStore;
use squadcall::voting::{InboundEvent, Participant, PollAnswerEvent};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const CHAT: ChatId = -100_200;
pub const ADMIN: i64 = 1_270_569_260;
pub const QUORUM: usize = 10;

// Option layout for the default three slots.
pub const SLOT_2200: usize = 0;
pub const SLOT_2230: usize = 1;
pub const SLOT_2300: usize = 2;
pub const DEFERRED: usize = 3;
pub const DECLINED: usize = 4;

/// 12:00 local (+03:30) on a fixed day. Every slot is still ahead.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 8, 30, 0).unwrap()
}

/// 22:40 local: the 22:00 and 22:30 slots have passed.
pub fn late_evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 19, 10, 0).unwrap()
}

// ============================================================================
// GATEWAY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message { chat: ChatId, text: String, format: TextFormat },
    Poll { chat: ChatId, question: String, options: Vec<String>, poll_id: String },
    Pin { chat: ChatId, message: MessageId },
    Delete { chat: ChatId, message: MessageId },
    StopPoll { chat: ChatId, message: MessageId },
}

/// Records every outbound call and hands out sequential ids.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    log: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
    fail_messages: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn push(&self, sent: Sent) {
        self.log.lock().unwrap().push(sent);
    }

    /// Make every `send_message` fail until switched off.
    pub fn fail_messages(&self, on: bool) {
        self.fail_messages.store(on, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn messages_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }

    /// (poll id, options) for every poll sent, in order.
    pub fn polls(&self) -> Vec<(String, Vec<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Poll { poll_id, options, .. } => Some((poll_id, options)),
                _ => None,
            })
            .collect()
    }

    pub fn last_poll(&self) -> Option<(String, Vec<String>)> {
        self.polls().pop()
    }
}

impl NotificationGateway for RecordingGateway {
    async fn send_message(&self, chat: ChatId, text: &str, format: TextFormat) -> Result<MessageId, GatewayError> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        let id = self.next();
        self.push(Sent::Message { chat, text: text.to_string(), format });
        Ok(id)
    }

    async fn send_poll(&self, chat: ChatId, question: &str, options: &[String]) -> Result<SentPoll, GatewayError> {
        let id = self.next();
        let poll_id = format!("poll-{id}");
        self.push(Sent::Poll {
            chat,
            question: question.to_string(),
            options: options.to_vec(),
            poll_id: poll_id.clone(),
        });
        Ok(SentPoll { poll_id, message_id: id })
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError> {
        self.push(Sent::Pin { chat, message });
        Ok(true)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError> {
        self.push(Sent::Delete { chat, message });
        Ok(true)
    }

    async fn stop_poll(&self, chat: ChatId, message: MessageId) -> Result<PollTally, GatewayError> {
        self.push(Sent::StopPoll { chat, message });
        Ok(PollTally::default())
    }
}

// ============================================================================
// STORE
// ============================================================================

/// In-memory stats store. `fail_next` makes the next N calls error out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    participation: Mutex<Vec<(i64, bool)>>,
    sessions: Mutex<HashMap<i64, SessionUpdate>>,
    created: Mutex<Vec<NaiveDate>>,
    selections: Mutex<HashMap<i64, DateTime<Utc>>>,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: &[(i64, DateTime<Utc>)]) -> Self {
        let store = Self::default();
        store.selections.lock().unwrap().extend(history.iter().copied());
        store
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Number of store calls made, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }

    pub fn participation(&self) -> Vec<(i64, bool)> {
        self.participation.lock().unwrap().clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn session(&self, id: i64) -> Option<SessionUpdate> {
        self.sessions.lock().unwrap().get(&id).cloned()
    }

    pub fn last_status(&self) -> Option<SessionStatus> {
        let created = self.created.lock().unwrap().len() as i64;
        self.session(created).map(|u| u.status)
    }

    pub fn selected_at(&self, id: i64) -> Option<DateTime<Utc>> {
        self.selections.lock().unwrap().get(&id).copied()
    }

    fn stats_for(&self, id: i64) -> Option<PlayerStats> {
        let votes: Vec<bool> = self
            .participation()
            .into_iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, positive)| positive)
            .collect();
        if votes.is_empty() {
            return None;
        }
        Some(PlayerStats {
            id,
            username: None,
            first_name: Some(format!("Player{id}")),
            total_votes: votes.len() as i32,
            positive_votes: votes.iter().filter(|v| **v).count() as i32,
            last_vote_at: None,
        })
    }
}

impl StatsStore for MemoryStore {
    async fn record_participation(&self, participant: &Participant, positive: bool) -> Result<(), sqlx::Error> {
        self.check()?;
        self.participation.lock().unwrap().push((participant.id, positive));
        Ok(())
    }

    async fn create_session(&self, date: NaiveDate) -> Result<i64, sqlx::Error> {
        self.check()?;
        let mut created = self.created.lock().unwrap();
        created.push(date);
        Ok(created.len() as i64)
    }

    async fn update_session(&self, id: i64, update: &SessionUpdate) -> Result<(), sqlx::Error> {
        self.check()?;
        self.sessions.lock().unwrap().insert(id, update.clone());
        Ok(())
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, sqlx::Error> {
        self.check()?;
        let sessions = self.sessions.lock().unwrap();
        Ok(AggregateStats {
            total_sessions: self.created.lock().unwrap().len() as i64,
            confirmed_sessions: sessions
                .values()
                .filter(|u| u.status == SessionStatus::Confirmed)
                .count() as i64,
        })
    }

    async fn player_stats(&self, id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
        self.check()?;
        Ok(self.stats_for(id))
    }

    async fn top_players(&self, limit: i64) -> Result<Vec<PlayerStats>, sqlx::Error> {
        self.check()?;
        let mut ids: Vec<i64> = self.participation().into_iter().map(|(id, _)| id).collect();
        ids.sort();
        ids.dedup();
        let mut stats: Vec<PlayerStats> = ids.into_iter().filter_map(|id| self.stats_for(id)).collect();
        stats.sort_by(|a, b| {
            b.total_votes
                .cmp(&a.total_votes)
                .then(b.positive_votes.cmp(&a.positive_votes))
                .then(a.id.cmp(&b.id))
        });
        stats.truncate(limit as usize);
        Ok(stats)
    }

    async fn record_selection(&self, participant: &Participant, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        self.check()?;
        self.selections.lock().unwrap().insert(participant.id, at);
        Ok(())
    }

    async fn selection_history(&self) -> Result<Vec<(i64, DateTime<Utc>)>, sqlx::Error> {
        self.check()?;
        Ok(self.selections.lock().unwrap().iter().map(|(k, v)| (*k, *v)).collect())
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

pub type TestBot = Bot<RecordingGateway, MemoryStore>;

pub fn test_config() -> BotConfig {
    BotConfig::default_for_chat(CHAT)
}

pub fn bot_with(config: BotConfig, store: MemoryStore) -> TestBot {
    Bot::new(config, RecordingGateway::new(), store)
        .with_clock(noon)
        .with_rng_seed(7)
}

pub fn test_bot() -> TestBot {
    bot_with(test_config(), MemoryStore::new())
}

/// A bot with a cycle already running. Returns the attendance poll id.
pub async fn started_bot() -> (TestBot, String) {
    let bot = test_bot();
    bot.start_cycle().await.expect("cycle starts");
    let poll_id = bot.gateway().last_poll().expect("attendance poll sent").0;
    (bot, poll_id)
}

pub fn player(id: i64) -> Participant {
    Participant {
        id,
        username: Some(format!("player{id}")),
        first_name: Some(format!("Player{id}")),
    }
}

pub fn vote(id: i64, poll_id: &str, option: usize) -> InboundEvent {
    InboundEvent::Vote(PollAnswerEvent {
        participant: Some(player(id)),
        selected_option_indices: vec![option],
        poll_id: poll_id.to_string(),
    })
}

pub fn retract(id: i64, poll_id: &str) -> InboundEvent {
    InboundEvent::Vote(PollAnswerEvent {
        participant: Some(player(id)),
        selected_option_indices: Vec::new(),
        poll_id: poll_id.to_string(),
    })
}

/// Commit players `ids` to `option`, one event each.
pub async fn commit_all(bot: &TestBot, poll_id: &str, ids: std::ops::RangeInclusive<i64>, option: usize) {
    for id in ids {
        bot.dispatch(vote(id, poll_id, option)).await;
    }
}
