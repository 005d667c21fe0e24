//! Outbound chat transport.

pub mod telegram;

use std::fmt;

pub type ChatId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// Handle to a poll that was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPoll {
    pub poll_id: String,
    pub message_id: MessageId,
}

/// Final counts returned when a poll is closed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollTally {
    pub options: Vec<(String, u32)>,
    pub total_voters: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    Transport(String),
    Api { status: u16, description: String },
    Decode(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(e) => write!(f, "transport failure: {e}"),
            GatewayError::Api { status, description } => {
                write!(f, "API rejected request ({status}): {description}")
            }
            GatewayError::Decode(e) => write!(f, "could not decode response: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Send/pin/delete operations against the group chat. Polls are always
/// single-choice and non-anonymous so answers can be attributed.
#[allow(async_fn_in_trait)]
pub trait NotificationGateway {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageId, GatewayError>;

    async fn send_poll(
        &self,
        chat: ChatId,
        question: &str,
        options: &[String],
    ) -> Result<SentPoll, GatewayError>;

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<bool, GatewayError>;

    /// Close a poll, addressed by the message that carries it.
    async fn stop_poll(&self, chat: ChatId, message: MessageId) -> Result<PollTally, GatewayError>;
}
