use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Marker, next_occurrence};
use crate::bot::Bot;
use crate::gateway::NotificationGateway;
use crate::store::StatsStore;

fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (target - now).to_std().unwrap_or_default()
}

/// Start a fresh cycle every day at the configured poll time.
pub fn spawn_daily_cycle<N, S>(bot: Arc<Bot<N, S>>)
where
    N: NotificationGateway + 'static,
    S: StatsStore + 'static,
{
    actix_web::rt::spawn(async move {
        loop {
            let now = bot.now();
            let config = bot.config();
            let at = next_occurrence(now, config.timezone, config.schedule.poll_at);
            log::info!("Next daily poll at {at}");
            tokio::time::sleep(until(at, now)).await;

            match bot.start_cycle().await {
                Ok(epoch) => schedule_markers(bot.clone(), epoch),
                Err(e) => log::error!("Daily poll failed: {e}"),
            }
        }
    });
}

/// Arm one-shot timers for every marker of the cycle `epoch`. Timers are
/// never cancelled: a reset bumps the epoch and they fire as no-ops.
pub fn schedule_markers<N, S>(bot: Arc<Bot<N, S>>, epoch: u64)
where
    N: NotificationGateway + 'static,
    S: StatsStore + 'static,
{
    for marker in Marker::ALL {
        let bot = bot.clone();
        let now = bot.now();
        let config = bot.config();
        let at = next_occurrence(now, config.timezone, config.schedule.time_of(marker));
        log::debug!("Scheduling {} marker for {at} (epoch {epoch})", marker.name());
        let delay = until(at, now);

        actix_web::rt::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = bot.fire_marker(marker, epoch).await {
                log::error!("{} marker failed: {e}", marker.name());
            }
        });
    }
}
