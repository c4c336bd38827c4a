//! Domain models for mission-deck.
//!
//! # Core Concepts
//!
//! ## Ephemeral Facts
//!
//! - [`DomainEvent`]: A normalized fact extracted from one log line or one
//!   unsolicited gateway message. Dispatched immediately, never stored.
//!
//! ## Projected State
//!
//! - [`Stage`] and [`AgentStatus`]: The mission pipeline and the workforce,
//!   driven by domain events.
//! - [`ApprovalRequest`]: A pending exec approval awaiting an operator decision.
//! - [`ActivityEntry`]: A bounded, most-recent-first log of agent activity.
//!
//! ## Observer View
//!
//! - [`DeckSnapshot`]: The read-only aggregate handed to observers on every
//!   mutation.

mod approval;
mod event;
mod pipeline;
mod snapshot;

pub use approval::*;
pub use event::*;
pub use pipeline::*;
pub use snapshot::*;
