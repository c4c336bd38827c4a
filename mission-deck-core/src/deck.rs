//! The aggregate state container.
//!
//! [`MissionDeck`] owns the pipeline, the approval ledger and the values fed
//! in by external collaborators. It is the only thing that mutates them, and
//! it hands observers read-only [`DeckSnapshot`]s.

use chrono::{DateTime, Utc};

use crate::agents::Roster;
use crate::extract::EventExtractor;
use crate::ledger::ApprovalLedger;
use crate::models::{ApprovalRequest, DeckSnapshot, DomainEvent, GatewayStatus, Usage, Vitals};
use crate::pipeline::{PipelineProjector, RevertSchedule};

#[derive(Debug, Clone)]
pub struct MissionDeck {
    extractor: EventExtractor,
    pipeline: PipelineProjector,
    approvals: ApprovalLedger,
    vitals: Option<Vitals>,
    usage: Option<Usage>,
    gateway: GatewayStatus,
}

/// Result of feeding one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub event: Option<DomainEvent>,
    pub revert: Option<RevertSchedule>,
}

impl MissionDeck {
    pub fn new(roster: Roster) -> Self {
        Self {
            extractor: EventExtractor::new(roster.clone()),
            pipeline: PipelineProjector::new(roster),
            approvals: ApprovalLedger::new(),
            vitals: None,
            usage: None,
            gateway: GatewayStatus::default(),
        }
    }

    pub fn roster(&self) -> &Roster {
        self.extractor.roster()
    }

    pub fn pipeline(&self) -> &PipelineProjector {
        &self.pipeline
    }

    pub fn approvals(&self) -> &ApprovalLedger {
        &self.approvals
    }

    /// Extract and apply one raw log line. Lines that yield no event leave
    /// the state untouched.
    pub fn ingest_line(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let Some(event) = self.extractor.extract(line) else {
            return LineOutcome {
                event: None,
                revert: None,
            };
        };
        let revert = self.apply(&event, now);
        LineOutcome {
            event: Some(event),
            revert,
        }
    }

    /// Apply one event to the ledger and the pipeline.
    pub fn apply(&mut self, event: &DomainEvent, now: DateTime<Utc>) -> Option<RevertSchedule> {
        match event {
            DomainEvent::ApprovalRequested { id, command } => {
                self.approvals
                    .upsert(ApprovalRequest::new(id.clone(), command.clone(), now));
            }
            DomainEvent::ApprovalResolved { id, .. } => {
                if !self.approvals.remove(id) {
                    tracing::debug!(id = %id, "resolved approval was not pending");
                }
            }
            DomainEvent::RunFinished => {
                // The run is over; anything still pending is moot.
                self.approvals.clear();
            }
            _ => {}
        }

        let revert = self.pipeline.apply(event, now);
        if matches!(event, DomainEvent::ApprovalResolved { .. }) {
            self.pipeline.set_attention(!self.approvals.is_empty());
        }
        revert
    }

    /// Record an approval request that arrived with its requesting agent.
    pub fn request_approval(
        &mut self,
        mut request: ApprovalRequest,
        now: DateTime<Utc>,
    ) -> Option<RevertSchedule> {
        if let Some(agent) = request.agent.take() {
            request.agent = Some(self.roster().coerce(Some(&agent)));
        }
        let event = DomainEvent::ApprovalRequested {
            id: request.id.clone(),
            command: request.command.clone(),
        };
        self.approvals.upsert(request);
        self.pipeline.apply(&event, now)
    }

    /// An operator-submitted mission, handled as a user message.
    pub fn submit_mission(&mut self, agent: Option<&str>, command: &str, now: DateTime<Utc>) -> String {
        self.pipeline.submit_mission(agent, command, now)
    }

    pub fn expire(&mut self, schedule: RevertSchedule) -> bool {
        self.pipeline.expire(schedule)
    }

    pub fn set_vitals(&mut self, vitals: Vitals) {
        self.vitals = Some(vitals);
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    /// Returns whether the status changed.
    pub fn set_gateway_connected(&mut self, connected: bool) -> bool {
        let changed = self.gateway.connected != connected;
        self.gateway.connected = connected;
        changed
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DeckSnapshot {
        DeckSnapshot {
            vitals: self.vitals.clone(),
            usage: self.usage.clone(),
            gateway: self.gateway,
            workforce: self.pipeline.agents().clone(),
            pipeline: self.pipeline.view(),
            approvals: self.approvals.iter().cloned().collect(),
            activity: self.pipeline.activity().cloned().collect(),
            updated_at: now,
        }
    }
}

impl Default for MissionDeck {
    fn default() -> Self {
        Self::new(Roster::default())
    }
}
