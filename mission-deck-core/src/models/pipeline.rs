use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stage of the mission pipeline.
///
/// - `Idle`: Nothing in flight
/// - `Consultation`: A mission or user message arrived
/// - `Assignment`: Work is blocked on an operator approval
/// - `Execution`: An agent is running a tool
/// - `Reflection`: A tool just finished; reverts to `Idle` after a short dwell
/// - `Delivery`: The run finished; reverts to `Idle` after a longer dwell
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Consultation,
    Assignment,
    Execution,
    Reflection,
    Delivery,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Consultation => "consultation",
            Self::Assignment => "assignment",
            Self::Execution => "execution",
            Self::Reflection => "reflection",
            Self::Delivery => "delivery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "consultation" => Some(Self::Consultation),
            "assignment" => Some(Self::Assignment),
            "execution" => Some(Self::Execution),
            "reflection" => Some(Self::Reflection),
            "delivery" => Some(Self::Delivery),
            _ => None,
        }
    }
}

/// Workforce status of one roster agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Label of what the agent is doing, usually the tool name.
    pub task: Option<String>,
    pub active: bool,
}

/// One line of the bounded activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub agent: String,
    pub text: String,
    pub at: DateTime<Utc>,
}
