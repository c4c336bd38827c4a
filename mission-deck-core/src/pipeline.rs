//! The mission pipeline state machine.
//!
//! ```text
//!   UserMessage ──────────────► Consultation
//!   ApprovalRequested ────────► Assignment    (attention raised)
//!   ToolStarted ──────────────► Execution     (agent active, activity logged)
//!   ToolEnded ────────────────► Reflection ──(5s)──► Idle
//!   RunFinished ──────────────► Delivery   ──(10s)─► Idle
//!   ApprovalResolved ─────────► (stage unchanged, narrative updated)
//! ```
//!
//! Every stage change bumps `generation`. Timed reverts are handed out as a
//! [`RevertSchedule`] carrying the generation they were scheduled under, and
//! [`PipelineProjector::expire`] only applies one whose generation is still
//! current. The projector owns no timers; the caller sleeps and reports back.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::agents::Roster;
use crate::models::{ActivityEntry, AgentStatus, Decision, DomainEvent, PipelineView, Stage};

/// Dwell in `Reflection` before reverting to `Idle`.
pub const REFLECTION_DWELL: Duration = Duration::from_secs(5);
/// Dwell in `Delivery` before reverting to `Idle`.
pub const DELIVERY_DWELL: Duration = Duration::from_secs(10);
/// Activity log capacity.
pub const ACTIVITY_CAPACITY: usize = 10;

/// A timed revert to `Idle` the caller must arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertSchedule {
    pub generation: u64,
    pub stage: Stage,
    pub after: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineProjector {
    roster: Roster,
    stage: Stage,
    generation: u64,
    agents: BTreeMap<String, AgentStatus>,
    command_text: Option<String>,
    assignment_text: Option<String>,
    attention: bool,
    activity: VecDeque<ActivityEntry>,
}

impl PipelineProjector {
    pub fn new(roster: Roster) -> Self {
        let agents = roster
            .agents()
            .iter()
            .map(|a| (a.clone(), AgentStatus::default()))
            .collect();
        Self {
            roster,
            stage: Stage::Idle,
            generation: 0,
            agents,
            command_text: None,
            assignment_text: None,
            attention: false,
            activity: VecDeque::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentStatus> {
        &self.agents
    }

    pub fn agent(&self, id: &str) -> Option<&AgentStatus> {
        self.agents.get(id)
    }

    /// Most-recent-first.
    pub fn activity(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.activity.iter()
    }

    pub fn attention(&self) -> bool {
        self.attention
    }

    pub fn view(&self) -> PipelineView {
        PipelineView {
            stage: self.stage,
            command_text: self.command_text.clone(),
            assignment_text: self.assignment_text.clone(),
            attention: self.attention,
        }
    }

    /// Apply one event. Returns a revert the caller must arm, if the new
    /// stage dwells.
    pub fn apply(&mut self, event: &DomainEvent, now: DateTime<Utc>) -> Option<RevertSchedule> {
        match event {
            DomainEvent::UserMessage { text } => {
                self.command_text = Some(text.clone());
                self.enter(Stage::Consultation);
                None
            }
            DomainEvent::ApprovalRequested { command, .. } => {
                self.assignment_text = Some(format!("Approval needed: {command}"));
                self.attention = true;
                self.enter(Stage::Assignment);
                None
            }
            DomainEvent::ToolStarted { agent, tool } => {
                let agent = self.roster.coerce(Some(agent));
                self.agents.insert(
                    agent.clone(),
                    AgentStatus {
                        task: Some(tool.clone()),
                        active: true,
                    },
                );
                self.log(agent.clone(), format!("{agent} started {tool}"), now);
                self.enter(Stage::Execution);
                None
            }
            DomainEvent::ToolEnded { agent } => {
                let agent = self.roster.coerce(Some(agent));
                tracing::debug!(agent = %agent, "tool ended");
                self.enter(Stage::Reflection);
                Some(self.schedule(REFLECTION_DWELL))
            }
            DomainEvent::RunFinished => {
                self.attention = false;
                self.assignment_text = None;
                self.enter(Stage::Delivery);
                Some(self.schedule(DELIVERY_DWELL))
            }
            DomainEvent::ApprovalResolved { id, decision } => {
                let verdict = match decision {
                    Decision::AllowOnce => "allowed once",
                    Decision::AllowAlways => "always allowed",
                    Decision::Deny => "denied",
                };
                self.assignment_text = Some(format!("Approval {id} {verdict}"));
                None
            }
        }
    }

    /// Record a mission submitted by an operator for `agent`.
    pub fn submit_mission(&mut self, agent: Option<&str>, command: &str, now: DateTime<Utc>) -> String {
        let agent = self.roster.coerce(agent);
        self.log(agent.clone(), format!("mission for {agent}: {command}"), now);
        self.apply(
            &DomainEvent::UserMessage {
                text: command.to_string(),
            },
            now,
        );
        agent
    }

    /// Lower the attention flag once no approvals remain.
    pub fn set_attention(&mut self, attention: bool) {
        self.attention = attention;
    }

    /// Apply a scheduled revert. A revert scheduled under an older
    /// generation is stale and ignored. Returns whether the stage changed.
    pub fn expire(&mut self, schedule: RevertSchedule) -> bool {
        if schedule.generation != self.generation || schedule.stage != self.stage {
            tracing::debug!(
                scheduled = schedule.generation,
                live = self.generation,
                "stale stage revert ignored"
            );
            return false;
        }
        for status in self.agents.values_mut() {
            status.active = false;
            status.task = None;
        }
        self.enter(Stage::Idle);
        true
    }

    fn enter(&mut self, stage: Stage) {
        if self.stage != stage {
            tracing::debug!(from = self.stage.as_str(), to = stage.as_str(), "stage transition");
        }
        self.stage = stage;
        self.generation += 1;
    }

    fn schedule(&self, after: Duration) -> RevertSchedule {
        RevertSchedule {
            generation: self.generation,
            stage: self.stage,
            after,
        }
    }

    fn log(&mut self, agent: String, text: String, at: DateTime<Utc>) {
        self.activity.push_front(ActivityEntry { agent, text, at });
        self.activity.truncate(ACTIVITY_CAPACITY);
    }
}

impl Default for PipelineProjector {
    fn default() -> Self {
        Self::new(Roster::default())
    }
}
