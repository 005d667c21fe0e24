use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::bot::{Bot, Handled};
use crate::errors::AppError;
use crate::gateway::NotificationGateway;
use crate::reminders::scheduler::schedule_markers;
use crate::store::StatsStore;
use crate::voting::events::parse_command;
use crate::voting::{InboundEvent, Participant, PollAnswerEvent};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// The slice of a Telegram `Update` the bot reacts to.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub poll_answer: Option<PollAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    pub user: Option<User>,
    #[serde(default)]
    pub option_ids: Vec<usize>,
}

impl From<User> for Participant {
    fn from(u: User) -> Self {
        Participant {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
        }
    }
}

/// Turn an update into an event, or `None` when there is nothing to act on.
pub fn parse_update(update: Update) -> Option<InboundEvent> {
    if let Some(answer) = update.poll_answer {
        return Some(InboundEvent::Vote(PollAnswerEvent {
            participant: answer.user.map(Participant::from),
            selected_option_indices: answer.option_ids,
            poll_id: answer.poll_id,
        }));
    }
    let message = update.message?;
    let text = message.text?;
    let sender = message.from.filter(|u| !u.is_bot).map(Participant::from);
    parse_command(&text, sender, message.chat.id)
}

/// POST /telegram/webhook
///
/// Always answers 200 once the secret checks out, so Telegram does not
/// redeliver updates the bot chose to drop.
pub async fn receive<N, S>(
    req: HttpRequest,
    body: web::Bytes,
    bot: web::Data<Bot<N, S>>,
) -> Result<HttpResponse, AppError>
where
    N: NotificationGateway + 'static,
    S: StatsStore + 'static,
{
    if let Some(secret) = &bot.config().webhook_secret {
        let supplied = req
            .headers()
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if supplied != Some(secret.as_str()) {
            log::warn!("Rejected webhook call without a valid secret token");
            return Err(AppError::Unauthorized);
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            log::warn!("Dropping undecodable update: {e}");
            return Ok(HttpResponse::Ok().finish());
        }
    };
    log::debug!("Update {} received", update.update_id);

    let Some(event) = parse_update(update) else {
        return Ok(HttpResponse::Ok().finish());
    };
    if let Handled::CycleStarted(epoch) = bot.dispatch(event).await {
        schedule_markers(bot.into_inner(), epoch);
    }
    Ok(HttpResponse::Ok().finish())
}

/// GET / sends visitors straight to the game server.
pub async fn server_redirect<N, S>(bot: web::Data<Bot<N, S>>) -> HttpResponse
where
    N: NotificationGateway + 'static,
    S: StatsStore + 'static,
{
    HttpResponse::Found()
        .insert_header(("Location", bot.config().server_connect_url.as_str()))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).expect("valid update json")
    }

    #[test]
    fn poll_answer_becomes_vote() {
        let event = parse_update(update(
            r#"{"update_id":1,"poll_answer":{"poll_id":"p9","user":{"id":7,"is_bot":false,"first_name":"Ana"},"option_ids":[2]}}"#,
        ));
        match event {
            Some(InboundEvent::Vote(vote)) => {
                assert_eq!(vote.poll_id, "p9");
                assert_eq!(vote.selected_option_indices, vec![2]);
                assert_eq!(vote.participant.map(|p| p.id), Some(7));
            }
            other => panic!("expected vote, got {other:?}"),
        }
    }

    #[test]
    fn retraction_has_no_options() {
        let event = parse_update(update(
            r#"{"update_id":2,"poll_answer":{"poll_id":"p9","user":{"id":7,"first_name":"Ana"},"option_ids":[]}}"#,
        ));
        assert!(matches!(event, Some(InboundEvent::Vote(v)) if v.selected_option_indices.is_empty()));
    }

    #[test]
    fn plain_chatter_is_ignored() {
        let event = parse_update(update(
            r#"{"update_id":3,"message":{"message_id":5,"from":{"id":7,"first_name":"Ana"},"chat":{"id":-100},"text":"gg"}}"#,
        ));
        assert_eq!(event, None);
    }

    #[test]
    fn command_with_bot_suffix_is_parsed() {
        let event = parse_update(update(
            r#"{"update_id":4,"message":{"message_id":6,"from":{"id":7,"first_name":"Ana"},"chat":{"id":-100},"text":"/top@squad_bot"}}"#,
        ));
        assert!(matches!(event, Some(InboundEvent::Command(c)) if c.chat_id == -100));
    }
}
