use super::{Bot, BotState, SessionTracker, StatsWrite, mentions};
use crate::errors::{AppError, render};
use crate::gateway::NotificationGateway;
use crate::models::game_session::{SessionEvent, SessionStatus};
use crate::reminders::Marker;
use crate::store::{StatsStore, with_retry};
use crate::templates_structs::{CancelledTemplate, DeferredCallTemplate, FollowUpTemplate, ReminderTemplate};

pub(super) const POLL_QUESTION: &str = "Who's playing tonight? Pick a start time";

/// What a marker did when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOutcome {
    /// A reset happened since it was scheduled.
    Stale,
    /// Nothing to say at this point.
    Skipped,
    Sent,
}

impl<N, S> Bot<N, S>
where
    N: NotificationGateway,
    S: StatsStore,
{
    /// Reset, then post and pin a fresh attendance poll and open the day's
    /// session. Returns the new epoch for marker scheduling.
    ///
    /// The session row is created after the state lock is released, so votes
    /// keep flowing while the store retries.
    pub async fn start_cycle(&self) -> Result<u64, AppError> {
        let now = self.now();
        let chat = self.config.chat_id;
        let epoch = {
            let mut st = self.state.lock().await;
            let epoch = st.reset();
            log::info!("Starting voting cycle {epoch}");

            let sent = self
                .gateway
                .send_poll(chat, POLL_QUESTION, &self.config.slots.labels())
                .await?;
            st.sent_messages.push(sent.message_id);
            if let Err(e) = self.gateway.pin_message(chat, sent.message_id).await {
                log::warn!("Could not pin attendance poll: {e}");
            }
            st.poll = Some(sent);
            st.session = Some(SessionTracker {
                id: None,
                status: SessionStatus::Pending,
                unsaved: None,
            });
            epoch
        };

        let date = now.with_timezone(&self.config.timezone).date_naive();
        let Some(id) = with_retry("create session", move || self.store.create_session(date)).await else {
            return Ok(epoch);
        };
        self.attach_session(epoch, id).await;
        Ok(epoch)
    }

    /// Bind the created row to the live session and write anything that
    /// happened to it meanwhile.
    async fn attach_session(&self, epoch: u64, id: i64) {
        let unsaved = {
            let mut st = self.state.lock().await;
            if st.epoch != epoch {
                log::warn!("Session {id} was created for cycle {epoch}, which has since been reset");
                return;
            }
            let Some(session) = st.session.as_mut() else {
                return;
            };
            session.id = Some(id);
            session.unsaved.take()
        };
        if let Some(update) = unsaved {
            self.flush(vec![StatsWrite::Session { id, update }]).await;
        }
    }

    /// Clear ledger, map pick and poll in one step and invalidate pending markers.
    pub async fn reset(&self) -> u64 {
        let epoch = self.state.lock().await.reset();
        log::info!("State reset; epoch is now {epoch}");
        epoch
    }

    /// Run a marker scheduled under `epoch`. Reads live state at fire time.
    pub async fn fire_marker(&self, marker: Marker, epoch: u64) -> Result<MarkerOutcome, AppError> {
        let mut writes = Vec::new();
        let result = {
            let mut st = self.state.lock().await;
            if st.epoch != epoch {
                log::debug!(
                    "Skipping stale {} marker (scheduled at epoch {epoch}, now {})",
                    marker.name(),
                    st.epoch
                );
                return Ok(MarkerOutcome::Stale);
            }
            self.run_marker(&mut st, marker, &mut writes).await
        };
        self.flush(writes).await;
        if let Ok(outcome) = &result {
            log::info!("{} marker fired: {outcome:?}", marker.name());
        }
        result
    }

    async fn run_marker(
        &self,
        st: &mut BotState,
        marker: Marker,
        writes: &mut Vec<StatsWrite>,
    ) -> Result<MarkerOutcome, AppError> {
        let threshold = self.config.quorum;
        let count = st.ledger.active_committed_count();
        let reached = st.ledger.is_quorum_reached(threshold);

        match marker {
            Marker::Reminder => {
                if reached {
                    return Ok(MarkerOutcome::Skipped);
                }
                let text = render(ReminderTemplate { count, threshold })?;
                self.post_group(st, &text).await;
                Ok(MarkerOutcome::Sent)
            }
            Marker::FollowUp => {
                if reached {
                    return Ok(MarkerOutcome::Skipped);
                }
                let text = render(FollowUpTemplate {
                    count,
                    threshold,
                    players: mentions(st.ledger.committed()),
                })?;
                self.post_group(st, &text).await;
                Ok(MarkerOutcome::Sent)
            }
            Marker::DeferredCall => {
                let mut outcome = MarkerOutcome::Skipped;
                if !reached {
                    let text = render(ReminderTemplate { count, threshold })?;
                    self.post_group(st, &text).await;
                    outcome = MarkerOutcome::Sent;
                }
                let deferred = mentions(st.ledger.deferred());
                if !deferred.is_empty() {
                    let text = render(DeferredCallTemplate { players: deferred })?;
                    self.post_group(st, &text).await;
                    outcome = MarkerOutcome::Sent;
                }
                Ok(outcome)
            }
            Marker::Final => {
                if let Some(poll) = st.poll.clone() {
                    if let Err(e) = self.gateway.stop_poll(self.config.chat_id, poll.message_id).await {
                        log::warn!("Could not stop attendance poll: {e}");
                    }
                }
                self.advance_session(st, SessionEvent::Closed { quorum_held: reached }, None, writes);
                if st.ledger.is_confirmed() {
                    return Ok(MarkerOutcome::Skipped);
                }
                let text = render(CancelledTemplate { count, threshold })?;
                self.post_group(st, &text).await;
                Ok(MarkerOutcome::Sent)
            }
        }
    }
}
