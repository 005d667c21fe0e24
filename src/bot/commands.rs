use super::{Bot, Handled};
use crate::errors::{AppError, render};
use crate::gateway::{ChatId, NotificationGateway};
use crate::models::game_session::AggregateStats;
use crate::reminders::Marker;
use crate::store::StatsStore;
use crate::templates_structs::{
    AdminStatusTemplate, GameStatsTemplate, HelpTemplate, PlayerStatsTemplate, ServerTemplate,
    StatsRow, TopPlayersTemplate,
};
use crate::voting::MapStage;
use crate::voting::events::{AdminKind, AdminTriggerCommand, PublicCommand, PublicCommandKind, ResetCommand};

const TOP_PLAYERS: i64 = 5;

impl<N, S> Bot<N, S>
where
    N: NotificationGateway,
    S: StatsStore,
{
    fn is_admin(&self, issued_by: Option<i64>) -> bool {
        issued_by == Some(self.config.admin_id)
    }

    pub(super) async fn handle_reset(&self, cmd: ResetCommand) -> Result<Handled, AppError> {
        if !self.is_admin(cmd.issued_by) {
            log::warn!("Ignoring reset from {:?} in chat {}", cmd.issued_by, cmd.chat_id);
            return Ok(Handled::Ignored);
        }
        self.reset().await;
        Ok(Handled::Done)
    }

    pub(super) async fn handle_admin(&self, cmd: AdminTriggerCommand) -> Result<Handled, AppError> {
        if !self.is_admin(cmd.issued_by) {
            log::warn!(
                "Ignoring admin command {:?} from {:?} in chat {}",
                cmd.kind,
                cmd.issued_by,
                cmd.chat_id
            );
            return Ok(Handled::Ignored);
        }
        log::info!("Admin command {:?}", cmd.kind);

        let marker = match cmd.kind {
            AdminKind::NewVote => {
                let epoch = self.start_cycle().await?;
                return Ok(Handled::CycleStarted(epoch));
            }
            AdminKind::Stats => {
                self.send_admin_status(cmd.chat_id).await?;
                return Ok(Handled::Done);
            }
            AdminKind::ClearMessages => {
                self.clear_messages().await;
                return Ok(Handled::Done);
            }
            AdminKind::TestAll => {
                let epoch = self.current_epoch().await;
                for marker in Marker::ALL {
                    self.fire_marker(marker, epoch).await?;
                }
                return Ok(Handled::Done);
            }
            AdminKind::TestReminder => Marker::Reminder,
            AdminKind::TestFollowUp => Marker::FollowUp,
            AdminKind::TestDeferredCall => Marker::DeferredCall,
            AdminKind::TestFinal => Marker::Final,
        };
        let epoch = self.current_epoch().await;
        self.fire_marker(marker, epoch).await?;
        Ok(Handled::Done)
    }

    pub(super) async fn handle_public(&self, cmd: PublicCommand) -> Result<Handled, AppError> {
        let text = match cmd.kind {
            PublicCommandKind::MyStats => {
                let Some(sender) = cmd.sender else {
                    return Ok(Handled::Ignored);
                };
                let stats = match self.store.player_stats(sender.id).await {
                    Ok(stats) => stats,
                    Err(e) => {
                        log::error!("Failed to load stats for {}: {e}", sender.id);
                        None
                    }
                };
                render(PlayerStatsTemplate {
                    name: sender.display_handle(),
                    stats: stats.as_ref().map(StatsRow::from),
                })?
            }
            PublicCommandKind::Top => {
                let players = self.store.top_players(TOP_PLAYERS).await.unwrap_or_else(|e| {
                    log::error!("Failed to load top players: {e}");
                    Vec::new()
                });
                render(TopPlayersTemplate {
                    rows: players.iter().map(StatsRow::from).collect(),
                })?
            }
            PublicCommandKind::GameStats => render(GameStatsTemplate::from(self.load_aggregate().await))?,
            PublicCommandKind::Help => render(HelpTemplate)?,
            PublicCommandKind::Server => render(ServerTemplate {
                url: self.config.server_connect_url.clone(),
            })?,
        };
        let mut st = self.state.lock().await;
        self.post(&mut st, cmd.chat_id, &text).await;
        Ok(Handled::Done)
    }

    async fn load_aggregate(&self) -> AggregateStats {
        self.store.aggregate_stats().await.unwrap_or_else(|e| {
            log::error!("Failed to load session stats: {e}");
            AggregateStats::default()
        })
    }

    async fn send_admin_status(&self, chat: ChatId) -> Result<(), AppError> {
        let sessions = self.load_aggregate().await;
        let mut st = self.state.lock().await;
        let map_stage = match st.maps.stage() {
            MapStage::Idle if st.maps.finalized().is_some() => "done",
            MapStage::Idle => "idle",
            MapStage::AwaitingFirstChoice { .. } => "waiting for first map",
            MapStage::AwaitingSecondChoice { .. } => "waiting for second map",
        };
        let text = render(AdminStatusTemplate {
            epoch: st.epoch,
            offline: self.store.is_degraded(),
            committed: st.ledger.active_committed_count(),
            threshold: self.config.quorum,
            confirmed: st.ledger.is_confirmed(),
            deferred: st.ledger.deferred().len(),
            declined: st.ledger.declined().len(),
            map_stage,
            maps: st.maps.finalized().cloned(),
            sessions,
        })?;
        self.post(&mut st, chat, &text).await;
        Ok(())
    }

    /// Best-effort delete of everything the bot has posted. Returns how many
    /// messages were actually removed.
    pub async fn clear_messages(&self) -> usize {
        let mut st = self.state.lock().await;
        let messages = std::mem::take(&mut st.sent_messages);
        let total = messages.len();
        let mut deleted = 0;
        for id in messages {
            match self.gateway.delete_message(self.config.chat_id, id).await {
                Ok(true) => deleted += 1,
                Ok(false) => log::debug!("Message {id} was not deleted"),
                Err(e) => log::warn!("Could not delete message {id}: {e}"),
            }
        }
        log::info!("Cleared {deleted}/{total} bot messages");
        deleted
    }
}
