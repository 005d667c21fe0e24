use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};

use squadcall::bot::Bot;
use squadcall::config::BotConfig;
use squadcall::gateway::telegram::TelegramGateway;
use squadcall::reminders::scheduler::spawn_daily_cycle;
use squadcall::store::{OfflineStore, PgStore, StatsBackend};
use squadcall::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = BotConfig::from_env().map_err(std::io::Error::other)?;

    // Without a database the bot still runs; stats just are not kept.
    let store = match config.database_url.as_deref() {
        Some(url) => match db::init_pool(url).await {
            Ok(pool) => StatsBackend::Postgres(PgStore::new(pool)),
            Err(e) => {
                log::error!("Database unavailable, running without stats: {e}");
                StatsBackend::Offline(OfflineStore)
            }
        },
        None => {
            log::warn!("No DATABASE_URL set, running without stats");
            StatsBackend::Offline(OfflineStore)
        }
    };

    let gateway = TelegramGateway::new(&config.api_base, &config.bot_token);
    let bind_addr = config.bind_addr.clone();
    let bot = Arc::new(Bot::new(config, gateway, store));
    bot.load_selection_history().await;
    spawn_daily_cycle(bot.clone());

    log::info!("Starting webhook server at http://{bind_addr}");

    let data = web::Data::from(bot);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(handlers::configure::<TelegramGateway, StatsBackend>)
    })
    .bind(bind_addr)?
    .run()
    .await
}
