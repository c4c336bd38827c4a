//! Turns raw log lines into [`DomainEvent`]s.
//!
//! Two tiers:
//!
//! 1. [`record::parse_structured`] pulls a message, a subsystem tag and an
//!    identity hint out of a JSON record. Anything that is not a JSON object
//!    skips this tier.
//! 2. [`rules::first_match`] runs the ordered rule cascade, first over the
//!    extracted message and then, if nothing matched, over the raw line.
//!
//! Extraction never fails: a line that matches no rule yields `None`.

pub mod record;
pub mod rules;

use crate::agents::Roster;
use crate::models::DomainEvent;

pub use record::ParsedRecord;
use rules::Scope;

/// Which rule produced an event and from which tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub rule: &'static str,
    pub event: DomainEvent,
    /// Subsystem tag of the structured record, if there was one.
    pub subsystem: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventExtractor {
    roster: Roster,
}

impl EventExtractor {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Parse one line into at most one event.
    pub fn extract(&self, line: &str) -> Option<DomainEvent> {
        self.classify(line).map(|e| e.event)
    }

    /// Like [`extract`](Self::extract), but also reports the winning rule.
    pub fn classify(&self, line: &str) -> Option<Extraction> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let record = record::parse_structured(line);
        let agent_hint = record.as_ref().and_then(|r| r.agent_hint.as_deref());
        let subsystem = record.as_ref().and_then(|r| r.subsystem.clone());

        let message = record
            .as_ref()
            .map(|r| r.message.trim())
            .filter(|m| !m.is_empty());

        let from_message = message.and_then(|text| {
            rules::first_match(&Scope {
                text,
                roster: &self.roster,
                agent_hint,
            })
        });

        let (rule, event) = from_message.or_else(|| {
            rules::first_match(&Scope {
                text: line,
                roster: &self.roster,
                agent_hint,
            })
        })?;

        tracing::trace!(rule, kind = event.kind(), "extracted event");
        Some(Extraction {
            rule,
            event,
            subsystem,
        })
    }
}
