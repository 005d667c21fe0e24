use std::fmt;

use super::ledger::Participant;

/// Everything the bot reacts to, after transport decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Vote(PollAnswerEvent),
    Reset(ResetCommand),
    Admin(AdminTriggerCommand),
    Command(PublicCommand),
}

/// Raw poll answer. Every field is untrusted until `validate` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAnswerEvent {
    pub participant: Option<Participant>,
    pub selected_option_indices: Vec<usize>,
    pub poll_id: String,
}

/// A poll answer that passed validation. `option` is `None` for a retraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidVote {
    pub participant: Participant,
    pub option: Option<usize>,
    pub poll_id: String,
}

impl ValidVote {
    pub fn selected(&self) -> Vec<usize> {
        self.option.into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingParticipant,
    MissingPollId,
    MultipleOptions(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingParticipant => write!(f, "poll answer without a participant"),
            ValidationError::MissingPollId => write!(f, "poll answer without a poll id"),
            ValidationError::MultipleOptions(n) => {
                write!(f, "{n} options selected on a single-choice poll")
            }
        }
    }
}

impl PollAnswerEvent {
    pub fn validate(self) -> Result<ValidVote, ValidationError> {
        let participant = self
            .participant
            .filter(|p| p.id != 0)
            .ok_or(ValidationError::MissingParticipant)?;
        if self.poll_id.trim().is_empty() {
            return Err(ValidationError::MissingPollId);
        }
        let option = match self.selected_option_indices.as_slice() {
            [] => None,
            [index] => Some(*index),
            many => return Err(ValidationError::MultipleOptions(many.len())),
        };
        Ok(ValidVote {
            participant,
            option,
            poll_id: self.poll_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCommand {
    pub issued_by: Option<i64>,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminKind {
    NewVote,
    TestReminder,
    TestFollowUp,
    TestDeferredCall,
    TestFinal,
    TestAll,
    Stats,
    ClearMessages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminTriggerCommand {
    pub issued_by: Option<i64>,
    pub chat_id: i64,
    pub kind: AdminKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicCommandKind {
    MyStats,
    Top,
    GameStats,
    Help,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicCommand {
    pub sender: Option<Participant>,
    pub chat_id: i64,
    pub kind: PublicCommandKind,
}

/// Parse a `/command` or `/command@botname` message into an event.
pub fn parse_command(
    text: &str,
    sender: Option<Participant>,
    chat_id: i64,
) -> Option<InboundEvent> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    let issued_by = sender.as_ref().map(|p| p.id);

    let admin = |kind| {
        Some(InboundEvent::Admin(AdminTriggerCommand { issued_by, chat_id, kind }))
    };
    let public = |kind| {
        Some(InboundEvent::Command(PublicCommand { sender: sender.clone(), chat_id, kind }))
    };

    match name {
        "reset" => Some(InboundEvent::Reset(ResetCommand { issued_by, chat_id })),
        "new_vote" => admin(AdminKind::NewVote),
        "test_reminder" => admin(AdminKind::TestReminder),
        "test_followup" => admin(AdminKind::TestFollowUp),
        "test_deferred" => admin(AdminKind::TestDeferredCall),
        "test_final" => admin(AdminKind::TestFinal),
        "test_all" => admin(AdminKind::TestAll),
        "admin_stats" => admin(AdminKind::Stats),
        "clear_messages" => admin(AdminKind::ClearMessages),
        "stats" => public(PublicCommandKind::MyStats),
        "top" => public(PublicCommandKind::Top),
        "game_stats" => public(PublicCommandKind::GameStats),
        "help" | "start" => public(PublicCommandKind::Help),
        "server" => public(PublicCommandKind::Server),
        _ => None,
    }
}
