//! Log-to-state projection engine.
//!
//! Everything in this crate is synchronous and owned by a single writer.
//! The async shell (tailer loop, stage timers, gateway connection, observer
//! broadcast) lives in the `mission-deck` crate and drives these types.

pub mod agents;
pub mod deck;
pub mod extract;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod tail;

pub use agents::Roster;
pub use deck::MissionDeck;
pub use extract::EventExtractor;
pub use ledger::ApprovalLedger;
pub use pipeline::PipelineProjector;
pub use tail::{LogCursor, LogTailer, TailError};
