//! Vote tracking core: the attendance ledger, start-time resolution and the
//! two-round map pick. Nothing in here performs I/O.

pub mod events;
pub mod ledger;
pub mod maps;
pub mod slots;

pub use events::{InboundEvent, PollAnswerEvent};
pub use ledger::{Participant, ParticipantId, QuorumTransition, RecordOutcome, VoteLedger, VoteState};
pub use maps::{MapAnswer, MapSelectionProtocol, MapStage};
pub use slots::{ResolvedStart, Selection, SlotConfig};
