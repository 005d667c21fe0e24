use chrono::{FixedOffset, NaiveTime};

use crate::errors::AppError;
use crate::reminders::MarkerSchedule;
use crate::voting::slots::SlotConfig;

const DEFAULT_ADMIN_ID: i64 = 1270569260;
const DEFAULT_QUORUM: usize = 10;
const DEFAULT_TZ_OFFSET_MINUTES: i32 = 210; // +03:30
const DEFAULT_SLOT_TIMES: &str = "22:00,22:30,23:00";
const DEFAULT_MAPS: &str = "Dust 2,Mirage,Inferno,Nuke,Ancient,Vertigo,Office,Anubis";
const DEFAULT_SERVER_URL: &str = "steam://run/730//+connect%205.57.32.32:28441/veilani";
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub chat_id: i64,
    pub admin_id: i64,
    pub quorum: usize,
    pub timezone: FixedOffset,
    pub slots: SlotConfig,
    pub maps: Vec<String>,
    pub schedule: MarkerSchedule,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub webhook_secret: Option<String>,
    pub server_connect_url: String,
    pub api_base: String,
}

impl BotConfig {
    /// Read configuration from the process environment. Call `dotenvy::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN")
            .ok_or_else(|| AppError::Config("BOT_TOKEN must be set".to_string()))?;
        let chat_id = parse_required::<i64>(get("GROUP_CHAT_ID"), "GROUP_CHAT_ID")?;
        let admin_id = parse_or(get("ADMIN_ID"), "ADMIN_ID", DEFAULT_ADMIN_ID)?;

        let quorum = parse_or(get("QUORUM"), "QUORUM", DEFAULT_QUORUM)?;
        if quorum == 0 {
            return Err(AppError::Config("QUORUM must be at least 1".to_string()));
        }

        let offset_minutes = parse_or(get("TZ_OFFSET_MINUTES"), "TZ_OFFSET_MINUTES", DEFAULT_TZ_OFFSET_MINUTES)?;
        let timezone = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| AppError::Config(format!("TZ_OFFSET_MINUTES out of range: {offset_minutes}")))?;

        let slot_times = parse_time_list(get("SLOT_TIMES").as_deref().unwrap_or(DEFAULT_SLOT_TIMES), "SLOT_TIMES")?;
        let slots = SlotConfig::new(slot_times)?;

        let maps = parse_list(get("MAPS").as_deref().unwrap_or(DEFAULT_MAPS));
        if maps.len() < 2 {
            return Err(AppError::Config("MAPS needs at least two entries".to_string()));
        }

        let defaults = MarkerSchedule::default();
        let schedule = MarkerSchedule {
            poll_at: parse_time_or(get("POLL_TIME"), "POLL_TIME", defaults.poll_at)?,
            reminder_at: parse_time_or(get("REMINDER_TIME"), "REMINDER_TIME", defaults.reminder_at)?,
            follow_up_at: parse_time_or(get("FOLLOW_UP_TIME"), "FOLLOW_UP_TIME", defaults.follow_up_at)?,
            deferred_call_at: parse_time_or(get("DEFERRED_CALL_TIME"), "DEFERRED_CALL_TIME", defaults.deferred_call_at)?,
            final_at: parse_time_or(get("FINAL_TIME"), "FINAL_TIME", defaults.final_at)?,
        };

        Ok(Self {
            bot_token,
            chat_id,
            admin_id,
            quorum,
            timezone,
            slots,
            maps,
            schedule,
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            webhook_secret: get("WEBHOOK_SECRET"),
            server_connect_url: get("SERVER_CONNECT_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            api_base: get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Defaults for everything except the target chat. Used by tests and local runs.
    pub fn default_for_chat(chat_id: i64) -> Self {
        let slot_times = parse_time_list(DEFAULT_SLOT_TIMES, "SLOT_TIMES")
            .expect("default slot times are valid");
        Self {
            bot_token: String::new(),
            chat_id,
            admin_id: DEFAULT_ADMIN_ID,
            quorum: DEFAULT_QUORUM,
            timezone: FixedOffset::east_opt(DEFAULT_TZ_OFFSET_MINUTES * 60)
                .expect("default offset is valid"),
            slots: SlotConfig::new(slot_times).expect("default slots are non-empty"),
            maps: parse_list(DEFAULT_MAPS),
            schedule: MarkerSchedule::default(),
            database_url: None,
            bind_addr: "127.0.0.1:8080".to_string(),
            webhook_secret: None,
            server_connect_url: DEFAULT_SERVER_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn parse_required<T: std::str::FromStr>(raw: Option<String>, key: &str) -> Result<T, AppError> {
    let raw = raw.ok_or_else(|| AppError::Config(format!("{key} must be set")))?;
    raw.parse::<T>()
        .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}")))
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match raw {
        Some(_) => parse_required(raw, key),
        None => Ok(default),
    }
}

fn parse_time(raw: &str, key: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| AppError::Config(format!("{key} expects HH:MM, got {raw}")))
}

fn parse_time_or(raw: Option<String>, key: &str, default: NaiveTime) -> Result<NaiveTime, AppError> {
    match raw {
        Some(v) => parse_time(&v, key),
        None => Ok(default),
    }
}

fn parse_time_list(raw: &str, key: &str) -> Result<Vec<NaiveTime>, AppError> {
    parse_list(raw).iter().map(|t| parse_time(t, key)).collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
