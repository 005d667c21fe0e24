pub mod webhook;

use actix_web::web;

use crate::gateway::NotificationGateway;
use crate::store::StatsStore;

/// Register the bot's HTTP routes. The bot itself must be in app data.
pub fn configure<N, S>(cfg: &mut web::ServiceConfig)
where
    N: NotificationGateway + 'static,
    S: StatsStore + 'static,
{
    cfg.route("/telegram/webhook", web::post().to(webhook::receive::<N, S>))
        .route("/", web::get().to(webhook::server_redirect::<N, S>));
}
