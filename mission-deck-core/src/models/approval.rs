use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending exec approval awaiting an operator decision.
///
/// Identity is `id`. A recurring id updates the existing entry in place
/// rather than creating a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    /// The command the agent wants to run.
    pub command: String,
    /// Agent that asked, when the source names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(id: impl Into<String>, command: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            agent: None,
            received_at,
        }
    }

    /// Merge a newer sighting of the same request into this one.
    ///
    /// Empty fields on the newer sighting never erase known values.
    pub fn merge(&mut self, newer: ApprovalRequest) {
        if !newer.command.is_empty() {
            self.command = newer.command;
        }
        if newer.agent.is_some() {
            self.agent = newer.agent;
        }
        self.received_at = newer.received_at;
    }
}
