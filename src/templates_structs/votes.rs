use askama::Template;

use super::Mention;

pub const JOINED_VARIANTS: usize = 5;
pub const DEFERRED_VARIANTS: usize = 3;
pub const RETRACTED_VARIANTS: usize = 3;
pub const REMOVED_VARIANTS: usize = 3;

#[derive(Template)]
#[template(path = "messages/joined.html")]
pub struct JoinedTemplate {
    pub who: Mention,
    pub variant: usize,
}

#[derive(Template)]
#[template(path = "messages/deferred.html")]
pub struct DeferredTemplate {
    pub who: Mention,
    pub variant: usize,
}

#[derive(Template)]
#[template(path = "messages/retracted.html")]
pub struct RetractedTemplate {
    pub who: Mention,
    pub variant: usize,
}

#[derive(Template)]
#[template(path = "messages/removed.html")]
pub struct RemovedTemplate {
    pub who: Mention,
    pub variant: usize,
}

#[derive(Template)]
#[template(path = "messages/progress.html")]
pub struct ProgressTemplate {
    pub count: usize,
    pub threshold: usize,
    pub players: Vec<Mention>,
}

#[derive(Template)]
#[template(path = "messages/confirmed.html")]
pub struct ConfirmedTemplate {
    pub start_time: String,
    pub fallback: bool,
    pub players: Vec<Mention>,
}

#[derive(Template)]
#[template(path = "messages/quorum_lost.html")]
pub struct QuorumLostTemplate {
    pub count: usize,
    pub threshold: usize,
}

#[derive(Template)]
#[template(path = "messages/cancelled.html")]
pub struct CancelledTemplate {
    pub count: usize,
    pub threshold: usize,
}

#[derive(Template)]
#[template(path = "messages/reminder.html")]
pub struct ReminderTemplate {
    pub count: usize,
    pub threshold: usize,
}

#[derive(Template)]
#[template(path = "messages/follow_up.html")]
pub struct FollowUpTemplate {
    pub count: usize,
    pub threshold: usize,
    pub players: Vec<Mention>,
}

#[derive(Template)]
#[template(path = "messages/deferred_call.html")]
pub struct DeferredCallTemplate {
    pub players: Vec<Mention>,
}

#[derive(Template)]
#[template(path = "messages/error.html")]
pub struct ErrorTemplate;
