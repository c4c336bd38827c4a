use serde::{Deserialize, Serialize};

/// A normalized fact extracted from the operational log or the gateway.
///
/// Every variant that names an agent carries a roster identity; unknown or
/// missing identities are coerced to the roster default before an event is
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DomainEvent {
    ToolStarted { agent: String, tool: String },
    ToolEnded { agent: String },
    UserMessage { text: String },
    RunFinished,
    ApprovalRequested { id: String, command: String },
    ApprovalResolved { id: String, decision: Decision },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolStarted { .. } => "tool-started",
            Self::ToolEnded { .. } => "tool-ended",
            Self::UserMessage { .. } => "user-message",
            Self::RunFinished => "run-finished",
            Self::ApprovalRequested { .. } => "approval-requested",
            Self::ApprovalResolved { .. } => "approval-resolved",
        }
    }

    /// The agent this event is attributed to, if any.
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::ToolStarted { agent, .. } | Self::ToolEnded { agent } => Some(agent),
            _ => None,
        }
    }
}

/// An operator decision on an exec approval.
///
/// - `AllowOnce`: Run this command this time only
/// - `AllowAlways`: Run it and stop asking for it
/// - `Deny`: Refuse the command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    AllowOnce,
    AllowAlways,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowOnce => "allow-once",
            Self::AllowAlways => "allow-always",
            Self::Deny => "deny",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "allow-once" | "allow" | "approved" | "granted" => Some(Self::AllowOnce),
            "allow-always" | "always" => Some(Self::AllowAlways),
            "deny" | "denied" | "rejected" => Some(Self::Deny),
            _ => None,
        }
    }

    /// Observer commands carry a plain allow flag.
    pub fn from_allow(allow: bool) -> Self {
        if allow {
            Self::AllowOnce
        } else {
            Self::Deny
        }
    }

    pub fn is_allow(&self) -> bool {
        !matches!(self, Self::Deny)
    }
}
