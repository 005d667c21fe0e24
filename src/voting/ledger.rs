use std::collections::HashMap;

use super::slots::Selection;

pub type ParticipantId = i64;

/// A chat member as seen on an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Participant {
    /// Name used when mentioning the participant.
    pub fn display_handle(&self) -> String {
        match (&self.first_name, &self.username) {
            (Some(first), _) if !first.is_empty() => first.clone(),
            (_, Some(user)) if !user.is_empty() => format!("@{user}"),
            _ => format!("player {}", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Committed { slot: usize },
    Deferred,
    Declined { via_retraction: bool },
}

#[derive(Debug, Clone)]
pub struct VoteRecord {
    pub participant: Participant,
    pub state: VoteState,
    seq: u64,
}

/// Effect of a single `record` call. Each variant maps to one notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Unchanged,
    Joined { slot: usize },
    Promoted { slot: usize },
    Deferred,
    Removed,
    Retracted { was_committed: bool },
}

impl RecordOutcome {
    /// Whether the committed count moved.
    pub fn changes_quorum(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Joined { .. }
                | RecordOutcome::Promoted { .. }
                | RecordOutcome::Retracted { was_committed: true }
        )
    }

    /// Participation flag to persist, if this outcome is a decision.
    pub fn participation(&self) -> Option<bool> {
        match self {
            RecordOutcome::Joined { .. } | RecordOutcome::Promoted { .. } => Some(true),
            RecordOutcome::Removed | RecordOutcome::Retracted { .. } => Some(false),
            RecordOutcome::Unchanged | RecordOutcome::Deferred => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumTransition {
    Unchanged,
    Confirmed,
    Lost,
    Regained,
}

/// Per-day registry of who is in, undecided or out.
#[derive(Debug, Default)]
pub struct VoteLedger {
    records: HashMap<ParticipantId, VoteRecord>,
    next_seq: u64,
    confirmed: bool,
    met: bool,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one selection. A committed participant's first slot sticks; a
    /// deferred participant is promoted by a later slot choice. The identity
    /// seen first is kept for mentions.
    pub fn record(&mut self, participant: Participant, selection: Selection) -> RecordOutcome {
        let existing = self.records.get(&participant.id);
        let current = existing.map(|r| r.state);
        let participant = existing.map(|r| r.participant.clone()).unwrap_or(participant);

        let (next, outcome) = match (current, selection) {
            // Retractions
            (None, Selection::Retract) => return RecordOutcome::Unchanged,
            (Some(VoteState::Declined { .. }), Selection::Retract) => return RecordOutcome::Unchanged,
            (Some(VoteState::Committed { .. }), Selection::Retract) => (
                VoteState::Declined { via_retraction: true },
                RecordOutcome::Retracted { was_committed: true },
            ),
            (Some(VoteState::Deferred), Selection::Retract) => (
                VoteState::Declined { via_retraction: true },
                RecordOutcome::Retracted { was_committed: false },
            ),

            // First choice sticks once committed
            (Some(VoteState::Committed { .. }), _) => return RecordOutcome::Unchanged,

            (Some(VoteState::Deferred), Selection::Slot(slot)) => {
                (VoteState::Committed { slot }, RecordOutcome::Promoted { slot })
            }
            (Some(VoteState::Deferred), Selection::Deferred) => return RecordOutcome::Unchanged,
            (Some(VoteState::Deferred), Selection::Declined) => {
                (VoteState::Declined { via_retraction: false }, RecordOutcome::Removed)
            }

            // Uncast, or out and voting again after a retraction
            (None | Some(VoteState::Declined { .. }), Selection::Slot(slot)) => {
                (VoteState::Committed { slot }, RecordOutcome::Joined { slot })
            }
            (None | Some(VoteState::Declined { .. }), Selection::Deferred) => {
                (VoteState::Deferred, RecordOutcome::Deferred)
            }
            (None, Selection::Declined) => {
                (VoteState::Declined { via_retraction: false }, RecordOutcome::Removed)
            }
            (Some(VoteState::Declined { via_retraction: true }), Selection::Declined) => {
                (VoteState::Declined { via_retraction: false }, RecordOutcome::Removed)
            }
            (Some(VoteState::Declined { via_retraction: false }), Selection::Declined) => {
                return RecordOutcome::Unchanged;
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            participant.id,
            VoteRecord {
                participant,
                state: next,
                seq,
            },
        );
        outcome
    }

    pub fn state_of(&self, id: ParticipantId) -> Option<VoteState> {
        self.records.get(&id).map(|r| r.state)
    }

    pub fn is_committed(&self, id: ParticipantId) -> bool {
        matches!(self.state_of(id), Some(VoteState::Committed { .. }))
    }

    /// The quorum metric: committed participants only.
    pub fn active_committed_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| matches!(r.state, VoteState::Committed { .. }))
            .count()
    }

    pub fn is_quorum_reached(&self, threshold: usize) -> bool {
        self.active_committed_count() >= threshold
    }

    /// Latched once quorum has been crossed this cycle.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Compare the live count against the threshold and update the latch.
    pub fn check_quorum(&mut self, threshold: usize) -> QuorumTransition {
        let met = self.is_quorum_reached(threshold);
        let transition = match (self.confirmed, self.met, met) {
            (false, _, true) => {
                self.confirmed = true;
                QuorumTransition::Confirmed
            }
            (true, true, false) => QuorumTransition::Lost,
            (true, false, true) => QuorumTransition::Regained,
            _ => QuorumTransition::Unchanged,
        };
        self.met = met;
        transition
    }

    /// Committed participants in the order they committed.
    pub fn committed(&self) -> Vec<&VoteRecord> {
        self.ordered(|s| matches!(s, VoteState::Committed { .. }))
    }

    pub fn deferred(&self) -> Vec<&VoteRecord> {
        self.ordered(|s| matches!(s, VoteState::Deferred))
    }

    pub fn declined(&self) -> Vec<&VoteRecord> {
        self.ordered(|s| matches!(s, VoteState::Declined { .. }))
    }

    /// Slot index of each committed vote, for the start-time tally.
    pub fn committed_slots(&self) -> Vec<usize> {
        self.committed()
            .iter()
            .filter_map(|r| match r.state {
                VoteState::Committed { slot } => Some(slot),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn ordered(&self, pred: impl Fn(&VoteState) -> bool) -> Vec<&VoteRecord> {
        let mut out: Vec<&VoteRecord> = self.records.values().filter(|r| pred(&r.state)).collect();
        out.sort_by_key(|r| r.seq);
        out
    }
}
