use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{ChatId, GatewayError, MessageId, NotificationGateway, PollTally, SentPoll, TextFormat};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_RESPONSE_BYTES: usize = 1 << 20;

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramGateway {
    api_base: String,
    token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message_id: i64,
    poll: Option<ApiPoll>,
}

#[derive(Deserialize)]
struct ApiPoll {
    id: String,
    #[serde(default)]
    options: Vec<ApiPollOption>,
    #[serde(default)]
    total_voter_count: u32,
}

#[derive(Deserialize)]
struct ApiPollOption {
    text: String,
    voter_count: u32,
}

impl TelegramGateway {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, GatewayError> {
        // awc clients are tied to the current thread, so one is built per call.
        let client = awc::Client::builder().timeout(self.timeout).finish();

        let mut response = client
            .post(self.method_url(method))
            .send_json(&payload)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();

        let body: ApiResponse<T> = response
            .json()
            .limit(MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !body.ok {
            return Err(GatewayError::Api {
                status,
                description: body.description.unwrap_or_default(),
            });
        }
        body.result
            .ok_or_else(|| GatewayError::Decode(format!("{method}: missing result")))
    }
}

impl NotificationGateway for TelegramGateway {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageId, GatewayError> {
        let mut payload = json!({ "chat_id": chat, "text": text });
        if format == TextFormat::Html {
            payload["parse_mode"] = json!("HTML");
        }
        let message: ApiMessage = self.call("sendMessage", payload).await?;
        Ok(message.message_id)
    }

    async fn send_poll(
        &self,
        chat: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<SentPoll, GatewayError> {
        let payload = json!({
            "chat_id": chat,
            "question": question,
            "options": options,
            "is_anonymous": false,
            "allows_multiple_answers": false,
        });
        let message: ApiMessage = self.call("sendPoll", payload).await?;
        let poll = message
            .poll
            .ok_or_else(|| GatewayError::Decode("sendPoll: message carries no poll".to_string()))?;
        Ok(SentPoll {
            poll_id: poll.id,
            message_id: message.message_id,
        })
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError> {
        let payload = json!({
            "chat_id": chat,
            "message_id": message,
            "disable_notification": false,
        });
        self.call("pinChatMessage", payload).await
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError> {
        let payload = json!({ "chat_id": chat, "message_id": message });
        self.call("deleteMessage", payload).await
    }

    async fn stop_poll(&self, chat: ChatId, message: MessageId) -> Result<PollTally, GatewayError> {
        let payload = json!({ "chat_id": chat, "message_id": message });
        let poll: ApiPoll = self.call("stopPoll", payload).await?;
        Ok(PollTally {
            options: poll
                .options
                .into_iter()
                .map(|o| (o.text, o.voter_count))
                .collect(),
            total_voters: poll.total_voter_count,
        })
    }
}
