//! The single-writer coordinator. Every inbound event and every marker takes
//! the state lock for its whole transition, gateway calls included, so no two
//! transitions interleave. Stats writes are collected while the lock is held
//! and flushed after it is released.

mod commands;
mod cycle;
mod votes;

pub use cycle::MarkerOutcome;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use crate::config::BotConfig;
use crate::errors::{AppError, render};
use crate::gateway::{ChatId, MessageId, NotificationGateway, SentPoll, TextFormat};
use crate::models::game_session::{SessionEvent, SessionStatus, SessionUpdate};
use crate::store::{StatsStore, with_retry};
use crate::templates_structs::{ErrorTemplate, Mention};
use crate::voting::ledger::VoteRecord;
use crate::voting::{InboundEvent, MapSelectionProtocol, MapStage, Participant, ParticipantId, VoteLedger};

pub type Clock = fn() -> DateTime<Utc>;

/// What came of one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Done,
    Ignored,
    /// A new daily cycle began; its markers still have to be scheduled.
    CycleStarted(u64),
    /// Handling failed and the group was told to retry.
    Failed,
}

#[derive(Debug, Clone)]
struct SessionTracker {
    id: Option<i64>,
    status: SessionStatus,
    // Latest update made before the row id arrived.
    unsaved: Option<SessionUpdate>,
}

enum StatsWrite {
    Participation { participant: Participant, positive: bool },
    Session { id: i64, update: SessionUpdate },
    Selection { participant: Participant, at: DateTime<Utc> },
}

struct BotState {
    epoch: u64,
    ledger: VoteLedger,
    maps: MapSelectionProtocol,
    poll: Option<SentPoll>,
    session: Option<SessionTracker>,
    // This cycle's posts, for /clear_messages.
    sent_messages: Vec<MessageId>,
    // Survives resets: rotation fairness spans days.
    selection_history: HashMap<ParticipantId, DateTime<Utc>>,
    rng: StdRng,
}

impl BotState {
    /// Wipe the day's state and invalidate every pending marker.
    fn reset(&mut self) -> u64 {
        self.epoch += 1;
        self.ledger.clear();
        self.maps.reset();
        self.poll = None;
        self.session = None;
        self.sent_messages.clear();
        self.epoch
    }
}

/// Read-only view of the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub epoch: u64,
    pub poll: Option<SentPoll>,
    pub committed: Vec<ParticipantId>,
    pub deferred: Vec<ParticipantId>,
    pub declined: Vec<ParticipantId>,
    pub confirmed: bool,
    pub map_stage: MapStage,
    pub maps: Option<(String, String)>,
    pub session_status: Option<SessionStatus>,
}

pub struct Bot<N, S> {
    config: BotConfig,
    gateway: N,
    store: S,
    clock: Clock,
    state: Mutex<BotState>,
}

impl<N, S> Bot<N, S>
where
    N: NotificationGateway,
    S: StatsStore,
{
    pub fn new(config: BotConfig, gateway: N, store: S) -> Self {
        let state = BotState {
            epoch: 0,
            ledger: VoteLedger::new(),
            maps: MapSelectionProtocol::new(config.maps.clone()),
            poll: None,
            session: None,
            sent_messages: Vec::new(),
            selection_history: HashMap::new(),
            rng: StdRng::from_os_rng(),
        };
        Self {
            config,
            gateway,
            store,
            clock: Utc::now,
            state: Mutex::new(state),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn gateway(&self) -> &N {
        &self.gateway
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn current_epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    pub async fn snapshot(&self) -> Snapshot {
        let st = self.state.lock().await;
        let ids = |records: Vec<&VoteRecord>| -> Vec<ParticipantId> {
            records.iter().map(|r| r.participant.id).collect()
        };
        Snapshot {
            epoch: st.epoch,
            poll: st.poll.clone(),
            committed: ids(st.ledger.committed()),
            deferred: ids(st.ledger.deferred()),
            declined: ids(st.ledger.declined()),
            confirmed: st.ledger.is_confirmed(),
            map_stage: st.maps.stage().clone(),
            maps: st.maps.finalized().cloned(),
            session_status: st.session.as_ref().map(|s| s.status),
        }
    }

    /// Seed selector rotation from the store.
    pub async fn load_selection_history(&self) {
        match self.store.selection_history().await {
            Ok(rows) => {
                let count = rows.len();
                self.state.lock().await.selection_history.extend(rows);
                log::info!("Loaded selector history for {count} players");
            }
            Err(e) => log::error!("Could not load selector history: {e}"),
        }
    }

    /// Entry point for every inbound event. Errors never escape: they are
    /// logged, and a failed vote gets one retry notice in the group. Gateway
    /// and store failures are absorbed further down, so on the vote path only
    /// a template render error ends up here.
    pub async fn dispatch(&self, event: InboundEvent) -> Handled {
        let is_vote = matches!(event, InboundEvent::Vote(_));
        match self.handle_event(event).await {
            Ok(handled) => handled,
            Err(e) => {
                log::error!("Event handling failed: {e}");
                if is_vote {
                    self.send_retry_notice().await;
                }
                Handled::Failed
            }
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<Handled, AppError> {
        match event {
            InboundEvent::Vote(answer) => self.handle_vote(answer).await,
            InboundEvent::Reset(cmd) => self.handle_reset(cmd).await,
            InboundEvent::Admin(cmd) => self.handle_admin(cmd).await,
            InboundEvent::Command(cmd) => self.handle_public(cmd).await,
        }
    }

    async fn send_retry_notice(&self) {
        let text = match render(ErrorTemplate) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Could not render retry notice: {e}");
                return;
            }
        };
        if let Err(e) = self.gateway.send_message(self.config.chat_id, &text, TextFormat::Plain).await {
            log::error!("Could not send retry notice: {e}");
        }
    }

    /// Send an HTML message. Failures are logged and only lose this message.
    async fn post(&self, st: &mut BotState, chat: ChatId, text: &str) -> Option<MessageId> {
        match self.gateway.send_message(chat, text, TextFormat::Html).await {
            Ok(id) => {
                st.sent_messages.push(id);
                Some(id)
            }
            Err(e) => {
                log::error!("Failed to send message to {chat}: {e}");
                None
            }
        }
    }

    async fn post_group(&self, st: &mut BotState, text: &str) -> Option<MessageId> {
        self.post(st, self.config.chat_id, text).await
    }

    /// Move the day's session along and queue the row update.
    fn advance_session(
        &self,
        st: &mut BotState,
        event: SessionEvent,
        start_time: Option<String>,
        writes: &mut Vec<StatsWrite>,
    ) {
        let player_count = st.ledger.active_committed_count() as i32;
        let Some(session) = st.session.as_mut() else {
            return;
        };
        session.status = session.status.apply(event);
        let update = SessionUpdate {
            status: session.status,
            start_time,
            player_count,
        };
        match session.id {
            Some(id) => writes.push(StatsWrite::Session { id, update }),
            None => session.unsaved = Some(update),
        }
    }

    async fn flush(&self, writes: Vec<StatsWrite>) {
        for write in writes {
            match write {
                StatsWrite::Participation { participant, positive } => {
                    let participant = &participant;
                    with_retry("record participation", move || {
                        self.store.record_participation(participant, positive)
                    })
                    .await;
                }
                StatsWrite::Session { id, update } => {
                    let update = &update;
                    with_retry("update session", move || self.store.update_session(id, update)).await;
                }
                StatsWrite::Selection { participant, at } => {
                    let participant = &participant;
                    with_retry("record selector", move || self.store.record_selection(participant, at)).await;
                }
            }
        }
    }
}

fn mentions(records: Vec<&VoteRecord>) -> Vec<Mention> {
    records.iter().map(|r| Mention::from(&r.participant)).collect()
}
