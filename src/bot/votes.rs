use chrono::{DateTime, Utc};
use rand::Rng;

use super::{Bot, BotState, Handled, StatsWrite, mentions};
use crate::errors::{AppError, render};
use crate::gateway::NotificationGateway;
use crate::models::game_session::SessionEvent;
use crate::store::StatsStore;
use crate::templates_structs::{
    ConfirmedTemplate, DEFERRED_VARIANTS, DeferredTemplate, JOINED_VARIANTS, JoinedTemplate,
    MapPromptTemplate, MapsAnnouncedTemplate, Mention, ProgressTemplate, QuorumLostTemplate,
    REMOVED_VARIANTS, RETRACTED_VARIANTS, RemovedTemplate, RetractedTemplate,
};
use crate::voting::events::ValidVote;
use crate::voting::maps::pick_selector;
use crate::voting::{
    MapAnswer, Participant, PollAnswerEvent, QuorumTransition, RecordOutcome, Selection,
};

pub(super) const FIRST_MAP_QUESTION: &str = "Pick the first map";
pub(super) const SECOND_MAP_QUESTION: &str = "Pick the second map";

impl<N, S> Bot<N, S>
where
    N: NotificationGateway,
    S: StatsStore,
{
    pub(super) async fn handle_vote(&self, answer: PollAnswerEvent) -> Result<Handled, AppError> {
        let vote = match answer.validate() {
            Ok(vote) => vote,
            Err(e) => {
                log::warn!("Dropping poll answer: {e}");
                return Ok(Handled::Ignored);
            }
        };
        let now = self.now();
        let mut writes = Vec::new();
        let result = {
            let mut st = self.state.lock().await;
            self.apply_vote(&mut st, &vote, now, &mut writes).await
        };
        self.flush(writes).await;
        result
    }

    async fn apply_vote(
        &self,
        st: &mut BotState,
        vote: &ValidVote,
        now: DateTime<Utc>,
        writes: &mut Vec<StatsWrite>,
    ) -> Result<Handled, AppError> {
        // The selector also answers the attendance poll, so the map pick only
        // claims answers to its own poll.
        match st.maps.handle_answer(vote.participant.id, &vote.poll_id, &vote.selected()) {
            MapAnswer::NotConsumed => self.record_attendance(st, vote, now, writes).await,
            MapAnswer::Ignored => {
                log::debug!("Selector {} sent an unusable map answer", vote.participant.id);
                Ok(Handled::Ignored)
            }
            MapAnswer::SecondRound { selector, first, options } => {
                log::info!("First map picked by {}: {first}", selector.id);
                self.open_map_poll(st, &selector, 2, SECOND_MAP_QUESTION, &options).await?;
                Ok(Handled::Done)
            }
            MapAnswer::Finalized { selector, first, second } => {
                log::info!("Maps settled by {}: {first}, {second}", selector.id);
                let text = render(MapsAnnouncedTemplate {
                    selector: Mention::from(&selector),
                    first,
                    second,
                })?;
                self.post_group(st, &text).await;
                st.selection_history.insert(selector.id, now);
                writes.push(StatsWrite::Selection { participant: selector, at: now });
                Ok(Handled::Done)
            }
        }
    }

    async fn record_attendance(
        &self,
        st: &mut BotState,
        vote: &ValidVote,
        now: DateTime<Utc>,
        writes: &mut Vec<StatsWrite>,
    ) -> Result<Handled, AppError> {
        if st.poll.as_ref().is_none_or(|p| p.poll_id != vote.poll_id) {
            log::debug!("Ignoring answer for unknown poll {}", vote.poll_id);
            return Ok(Handled::Ignored);
        }
        let selection = match vote.option {
            None => Selection::Retract,
            Some(index) => match self.config.slots.selection_for(index) {
                Some(selection) => selection,
                None => {
                    log::warn!(
                        "Dropping out-of-range option {index} from {}",
                        vote.participant.id
                    );
                    return Ok(Handled::Ignored);
                }
            },
        };

        let outcome = st.ledger.record(vote.participant.clone(), selection);
        if outcome == RecordOutcome::Unchanged {
            log::debug!("Vote from {} left the ledger unchanged", vote.participant.id);
            return Ok(Handled::Ignored);
        }
        log::info!("Vote from {}: {outcome:?}", vote.participant.id);

        if let Some(positive) = outcome.participation() {
            writes.push(StatsWrite::Participation {
                participant: vote.participant.clone(),
                positive,
            });
        }
        self.announce_outcome(st, &vote.participant, outcome).await?;
        if outcome.changes_quorum() {
            self.after_count_change(st, now, writes).await?;
        }
        Ok(Handled::Done)
    }

    async fn announce_outcome(
        &self,
        st: &mut BotState,
        participant: &Participant,
        outcome: RecordOutcome,
    ) -> Result<(), AppError> {
        let who = Mention::from(participant);
        let text = match outcome {
            RecordOutcome::Unchanged => return Ok(()),
            RecordOutcome::Joined { .. } | RecordOutcome::Promoted { .. } => render(JoinedTemplate {
                who,
                variant: st.rng.random_range(0..JOINED_VARIANTS),
            })?,
            RecordOutcome::Deferred => render(DeferredTemplate {
                who,
                variant: st.rng.random_range(0..DEFERRED_VARIANTS),
            })?,
            RecordOutcome::Retracted { .. } => render(RetractedTemplate {
                who,
                variant: st.rng.random_range(0..RETRACTED_VARIANTS),
            })?,
            RecordOutcome::Removed => render(RemovedTemplate {
                who,
                variant: st.rng.random_range(0..REMOVED_VARIANTS),
            })?,
        };
        self.post_group(st, &text).await;
        Ok(())
    }

    async fn after_count_change(
        &self,
        st: &mut BotState,
        now: DateTime<Utc>,
        writes: &mut Vec<StatsWrite>,
    ) -> Result<(), AppError> {
        let threshold = self.config.quorum;

        let selector_left = st
            .maps
            .selector()
            .is_some_and(|s| !st.ledger.is_committed(s.id));
        if selector_left && st.maps.discard() {
            log::info!("Map selector withdrew; selection discarded");
        }

        match st.ledger.check_quorum(threshold) {
            QuorumTransition::Confirmed => {
                self.confirm_session(st, now, writes).await?;
                self.begin_map_selection(st, now).await?;
            }
            QuorumTransition::Lost => {
                if st.maps.discard() {
                    log::info!("Quorum lost; map selection discarded");
                }
                let text = render(QuorumLostTemplate {
                    count: st.ledger.active_committed_count(),
                    threshold,
                })?;
                self.post_group(st, &text).await;
                self.advance_session(st, SessionEvent::QuorumLost, None, writes);
            }
            QuorumTransition::Regained => {
                self.post_progress(st).await?;
                let start = self.resolve_start(st, now);
                self.advance_session(st, SessionEvent::QuorumReached, Some(start.label()), writes);
                self.begin_map_selection(st, now).await?;
            }
            QuorumTransition::Unchanged => {
                self.post_progress(st).await?;
                if selector_left && st.ledger.is_quorum_reached(threshold) {
                    self.begin_map_selection(st, now).await?;
                }
            }
        }
        Ok(())
    }

    fn resolve_start(&self, st: &BotState, now: DateTime<Utc>) -> crate::voting::ResolvedStart {
        let local = now.with_timezone(&self.config.timezone).time();
        self.config.slots.resolve(local, &st.ledger.committed_slots())
    }

    async fn confirm_session(
        &self,
        st: &mut BotState,
        now: DateTime<Utc>,
        writes: &mut Vec<StatsWrite>,
    ) -> Result<(), AppError> {
        let start = self.resolve_start(st, now);
        let text = render(ConfirmedTemplate {
            start_time: start.label(),
            fallback: start.fallback,
            players: mentions(st.ledger.committed()),
        })?;
        self.post_group(st, &text).await;
        log::info!(
            "Quorum confirmed with {} players, start at {} ({} votes)",
            st.ledger.active_committed_count(),
            start.label(),
            start.votes
        );
        self.advance_session(st, SessionEvent::QuorumReached, Some(start.label()), writes);
        Ok(())
    }

    async fn post_progress(&self, st: &mut BotState) -> Result<(), AppError> {
        let text = render(ProgressTemplate {
            count: st.ledger.active_committed_count(),
            threshold: self.config.quorum,
            players: mentions(st.ledger.committed()),
        })?;
        self.post_group(st, &text).await;
        Ok(())
    }

    /// Pick a selector among committed players and open the first map poll.
    /// No-op while an instance runs or once maps are settled.
    async fn begin_map_selection(&self, st: &mut BotState, now: DateTime<Utc>) -> Result<(), AppError> {
        if st.maps.is_active() || st.maps.finalized().is_some() {
            return Ok(());
        }
        let eligible: Vec<Participant> = st
            .ledger
            .committed()
            .iter()
            .map(|r| r.participant.clone())
            .collect();
        let Some(selector) = pick_selector(&eligible, &st.selection_history, now, &mut st.rng) else {
            log::warn!("No committed player available to pick maps");
            return Ok(());
        };
        let Some(options) = st.maps.begin(selector.clone()) else {
            return Ok(());
        };
        log::info!("Map selection started; selector {}", selector.id);
        self.open_map_poll(st, &selector, 1, FIRST_MAP_QUESTION, &options).await
    }

    async fn open_map_poll(
        &self,
        st: &mut BotState,
        selector: &Participant,
        round: u8,
        question: &str,
        options: &[String],
    ) -> Result<(), AppError> {
        let prompt = render(MapPromptTemplate {
            selector: Mention::from(selector),
            round,
        });
        let prompt = match prompt {
            Ok(text) => text,
            Err(e) => {
                st.maps.discard();
                return Err(e);
            }
        };
        self.post_group(st, &prompt).await;
        match self.gateway.send_poll(self.config.chat_id, question, options).await {
            Ok(sent) => {
                st.sent_messages.push(sent.message_id);
                st.maps.attach_poll(sent);
            }
            Err(e) => {
                log::error!("Failed to send map poll (round {round}): {e}");
                st.maps.discard();
            }
        }
        Ok(())
    }
}
