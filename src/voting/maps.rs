use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::ledger::{Participant, ParticipantId};
use crate::gateway::SentPoll;

/// Hours after which a past selector counts as fully rested.
const FULL_ROTATION_HOURS: u64 = 24 * 14;

/// Where the two-round map pick currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MapStage {
    #[default]
    Idle,
    AwaitingFirstChoice {
        selector: Participant,
        poll: Option<SentPoll>,
    },
    AwaitingSecondChoice {
        selector: Participant,
        poll: Option<SentPoll>,
        first: String,
        options: Vec<String>,
    },
}

/// Result of offering a poll answer to the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapAnswer {
    /// Not the selector or not a map poll; the attendance handler should look at it.
    NotConsumed,
    /// The selector answered the map poll but with nothing usable.
    Ignored,
    SecondRound {
        selector: Participant,
        first: String,
        options: Vec<String>,
    },
    Finalized {
        selector: Participant,
        first: String,
        second: String,
    },
}

#[derive(Debug)]
pub struct MapSelectionProtocol {
    candidates: Vec<String>,
    stage: MapStage,
    finalized: Option<(String, String)>,
}

impl MapSelectionProtocol {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            stage: MapStage::Idle,
            finalized: None,
        }
    }

    pub fn stage(&self) -> &MapStage {
        &self.stage
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.stage, MapStage::Idle)
    }

    pub fn finalized(&self) -> Option<&(String, String)> {
        self.finalized.as_ref()
    }

    pub fn selector(&self) -> Option<&Participant> {
        match &self.stage {
            MapStage::Idle => None,
            MapStage::AwaitingFirstChoice { selector, .. }
            | MapStage::AwaitingSecondChoice { selector, .. } => Some(selector),
        }
    }

    /// Start a selection round. Returns the first poll's options, or `None`
    /// when an instance is already running or maps are settled for the cycle.
    pub fn begin(&mut self, selector: Participant) -> Option<Vec<String>> {
        if self.is_active() || self.finalized.is_some() {
            return None;
        }
        self.stage = MapStage::AwaitingFirstChoice { selector, poll: None };
        Some(self.candidates.clone())
    }

    /// Bind the poll that was just sent for the current round.
    pub fn attach_poll(&mut self, sent: SentPoll) {
        match &mut self.stage {
            MapStage::Idle => {}
            MapStage::AwaitingFirstChoice { poll, .. }
            | MapStage::AwaitingSecondChoice { poll, .. } => *poll = Some(sent),
        }
    }

    /// Poll currently open for the selector, if any.
    pub fn open_poll(&self) -> Option<&SentPoll> {
        match &self.stage {
            MapStage::Idle => None,
            MapStage::AwaitingFirstChoice { poll, .. }
            | MapStage::AwaitingSecondChoice { poll, .. } => poll.as_ref(),
        }
    }

    pub fn handle_answer(
        &mut self,
        participant: ParticipantId,
        poll_id: &str,
        selected: &[usize],
    ) -> MapAnswer {
        let stage = std::mem::take(&mut self.stage);
        let (answer, next) = match stage {
            MapStage::Idle => (MapAnswer::NotConsumed, MapStage::Idle),

            MapStage::AwaitingFirstChoice { selector, poll } => {
                if !answers_poll(&selector, poll.as_ref(), participant, poll_id) {
                    (MapAnswer::NotConsumed, MapStage::AwaitingFirstChoice { selector, poll })
                } else {
                    match single_choice(selected, &self.candidates) {
                        None => (MapAnswer::Ignored, MapStage::AwaitingFirstChoice { selector, poll }),
                        Some(first) => {
                            let options: Vec<String> = self
                                .candidates
                                .iter()
                                .filter(|m| **m != first)
                                .cloned()
                                .collect();
                            (
                                MapAnswer::SecondRound {
                                    selector: selector.clone(),
                                    first: first.clone(),
                                    options: options.clone(),
                                },
                                MapStage::AwaitingSecondChoice {
                                    selector,
                                    poll: None,
                                    first,
                                    options,
                                },
                            )
                        }
                    }
                }
            }

            MapStage::AwaitingSecondChoice { selector, poll, first, options } => {
                if !answers_poll(&selector, poll.as_ref(), participant, poll_id) {
                    (
                        MapAnswer::NotConsumed,
                        MapStage::AwaitingSecondChoice { selector, poll, first, options },
                    )
                } else {
                    match single_choice(selected, &options) {
                        None => (
                            MapAnswer::Ignored,
                            MapStage::AwaitingSecondChoice { selector, poll, first, options },
                        ),
                        Some(second) => {
                            self.finalized = Some((first.clone(), second.clone()));
                            (MapAnswer::Finalized { selector, first, second }, MapStage::Idle)
                        }
                    }
                }
            }
        };
        self.stage = next;
        answer
    }

    /// Drop any in-progress round. Finalized maps are kept.
    pub fn discard(&mut self) -> bool {
        let was_active = self.is_active();
        self.stage = MapStage::Idle;
        was_active
    }

    /// New cycle: forget everything.
    pub fn reset(&mut self) {
        self.stage = MapStage::Idle;
        self.finalized = None;
    }
}

fn answers_poll(
    selector: &Participant,
    poll: Option<&SentPoll>,
    participant: ParticipantId,
    poll_id: &str,
) -> bool {
    selector.id == participant && poll.is_some_and(|p| p.poll_id == poll_id)
}

fn single_choice(selected: &[usize], options: &[String]) -> Option<String> {
    match selected {
        [index] => options.get(*index).cloned(),
        _ => None,
    }
}

/// Selection weight: never-picked and long-rested players weigh the most.
pub fn selector_weight(last_selected: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    match last_selected {
        None => FULL_ROTATION_HOURS + 1,
        Some(at) => {
            let hours = (now - at).num_hours().max(0) as u64;
            hours.min(FULL_ROTATION_HOURS) + 1
        }
    }
}

/// Pick the selector among eligible players, favouring whoever has waited longest.
pub fn pick_selector<R: Rng + ?Sized>(
    eligible: &[Participant],
    history: &HashMap<ParticipantId, DateTime<Utc>>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<Participant> {
    let weights: Vec<u64> = eligible
        .iter()
        .map(|p| selector_weight(history.get(&p.id).copied(), now))
        .collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    eligible.get(dist.sample(rng)).cloned()
}
