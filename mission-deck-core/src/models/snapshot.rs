use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActivityEntry, AgentStatus, ApprovalRequest, Stage};

/// Host resource sample supplied by an external sampler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub sampled_at: Option<DateTime<Utc>>,
}

/// Usage accounting supplied by an external status probe.
///
/// The shape is owned by the probe; it is relayed to observers verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage(pub serde_json::Value);

/// Control channel reachability as seen by observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub connected: bool,
}

/// Pipeline portion of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineView {
    pub stage: Stage,
    pub command_text: Option<String>,
    pub assignment_text: Option<String>,
    /// Set while an approval is waiting on the operator.
    pub attention: bool,
}

/// Full read-only aggregate state, broadcast to every observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSnapshot {
    pub vitals: Option<Vitals>,
    pub usage: Option<Usage>,
    pub gateway: GatewayStatus,
    pub workforce: BTreeMap<String, AgentStatus>,
    pub pipeline: PipelineView,
    /// Most-recent-first.
    pub approvals: Vec<ApprovalRequest>,
    /// Most-recent-first.
    pub activity: Vec<ActivityEntry>,
    pub updated_at: DateTime<Utc>,
}
