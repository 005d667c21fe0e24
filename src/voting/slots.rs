use chrono::NaiveTime;

use crate::errors::AppError;

const DEFERRED_LABEL: &str = "I'll decide by 21:00";
const DECLINED_LABEL: &str = "Can't make it";

/// What a participant picked on the attendance poll. `Retract` is the empty
/// answer the platform sends when a vote is withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Slot(usize),
    Deferred,
    Declined,
    Retract,
}

/// Kind of a single poll option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Slot(NaiveTime),
    Deferred,
    Declined,
}

/// Ordered start-time slots followed by the "decide later" and "can't come"
/// options. Poll option indices map onto this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    slots: Vec<NaiveTime>,
}

/// A slot tagged against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSlot {
    pub index: usize,
    pub time: NaiveTime,
    pub in_voting_window: bool,
}

/// Winner of the start-time tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStart {
    pub slot_index: usize,
    pub time: NaiveTime,
    pub votes: usize,
    /// Set when every slot had already passed and the latest one was taken.
    pub fallback: bool,
}

impl ResolvedStart {
    pub fn label(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

impl SlotConfig {
    pub fn new(slots: Vec<NaiveTime>) -> Result<Self, AppError> {
        if slots.is_empty() {
            return Err(AppError::Config("at least one start-time slot is required".to_string()));
        }
        Ok(Self { slots })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn option_count(&self) -> usize {
        self.slots.len() + 2
    }

    pub fn option_kind(&self, index: usize) -> Option<OptionKind> {
        let n = self.slots.len();
        match index {
            i if i < n => Some(OptionKind::Slot(self.slots[i])),
            i if i == n => Some(OptionKind::Deferred),
            i if i == n + 1 => Some(OptionKind::Declined),
            _ => None,
        }
    }

    /// Map a poll option index to a ledger selection.
    pub fn selection_for(&self, index: usize) -> Option<Selection> {
        self.option_kind(index).map(|kind| match kind {
            OptionKind::Slot(_) => Selection::Slot(index),
            OptionKind::Deferred => Selection::Deferred,
            OptionKind::Declined => Selection::Declined,
        })
    }

    /// Poll option labels in index order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .slots
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect();
        labels.push(DEFERRED_LABEL.to_string());
        labels.push(DECLINED_LABEL.to_string());
        labels
    }

    /// Slots tagged with whether they still lie ahead of `now`.
    pub fn candidates(&self, now: NaiveTime) -> Vec<CandidateSlot> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, &time)| CandidateSlot {
                index,
                time,
                in_voting_window: time > now,
            })
            .collect()
    }

    /// Pick the start time from committed slot choices.
    ///
    /// Only slots still ahead of `now` are counted. The highest tally wins and
    /// ties go to the earlier configured slot. When every slot has passed, the
    /// latest one is returned with `fallback` set.
    pub fn resolve(&self, now: NaiveTime, committed_slots: &[usize]) -> ResolvedStart {
        let candidates = self.candidates(now);

        let mut best: Option<ResolvedStart> = None;
        for slot in candidates.iter().filter(|c| c.in_voting_window) {
            let votes = committed_slots.iter().filter(|&&s| s == slot.index).count();
            if best.is_none_or(|b| votes > b.votes) {
                best = Some(ResolvedStart {
                    slot_index: slot.index,
                    time: slot.time,
                    votes,
                    fallback: false,
                });
            }
        }
        if let Some(winner) = best {
            return winner;
        }

        let mut latest = candidates[0];
        for slot in &candidates[1..] {
            if slot.time > latest.time {
                latest = *slot;
            }
        }
        ResolvedStart {
            slot_index: latest.index,
            time: latest.time,
            votes: committed_slots.iter().filter(|&&s| s == latest.index).count(),
            fallback: true,
        }
    }
}
