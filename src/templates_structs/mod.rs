//! Askama structs for every chat message the bot posts.

mod maps;
mod stats;
mod votes;

pub use maps::*;
pub use stats::*;
pub use votes::*;

use crate::voting::Participant;

/// A participant rendered as an inline `tg://user` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub id: i64,
    pub name: String,
}

impl From<&Participant> for Mention {
    fn from(p: &Participant) -> Self {
        Mention {
            id: p.id,
            name: p.display_handle(),
        }
    }
}

/// Format a percentage with one decimal.
pub fn percent(value: f64) -> String {
    format!("{value:.1}")
}
