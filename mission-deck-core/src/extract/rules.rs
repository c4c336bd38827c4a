//! Tier 2: the ordered text rule table.
//!
//! Rules are tried top to bottom and the first whose pattern matches wins;
//! no later rule sees the text. The order is part of the contract:
//!
//! 1. `approval-requested`
//! 2. `approval-resolved`
//! 3. `tool-start`
//! 4. `tool-end`
//! 5. `user-message`
//! 6. `run-finished`
//!
//! So a line that says both "Calling tool" and "Approval required" is an
//! approval request.
//! Update the patterns when the gateway's log phrasing changes.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use uuid::Uuid;

use crate::agents::Roster;
use crate::models::{Decision, DomainEvent};

// ═══════════════════════════════════════════════════════════════════════════════
// Rule Patterns
// ═══════════════════════════════════════════════════════════════════════════════

static RE_APPROVAL_REQUESTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:exec\s+)?approval\s+(?:required|requested|needed|pending)\b|\brequires?\s+approval\b")
        .unwrap()
});
static RE_APPROVAL_RESOLVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bapproval\s+(resolved|granted|approved|allowed|denied|rejected)\b").unwrap()
});
static RE_TOOL_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\btool[\s_-]?start(?:ed)?\b(?:.*?\b(?:tool|name)[=:]\s*"?([\w.:/-]+))?|\b(?:calling|invoking)\s+tool\b[\s:]*"?([\w.:/-]+)?"#,
    )
    .unwrap()
});
static RE_TOOL_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btool[\s_-]?(?:end(?:ed)?|done|finished|completed?)\b|\btool\s+result\b").unwrap()
});
static RE_USER_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:inbound|incoming|user)\s+message|received\s+message)\b[\s:]*(.*)$").unwrap()
});
static RE_RUN_FINISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:embedded\s+)?run\s+(?:done|finished|completed?|ended)\b|\bagent\s+end\b").unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// Field Patterns
// ═══════════════════════════════════════════════════════════════════════════════

static RE_APPROVAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:approval[_-]?id|id)[=:]\s*"?([A-Za-z0-9_.:-]+)"#).unwrap()
});
static RE_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:command|cmd)[=:]\s*(?:"([^"]*)"|`([^`]*)`|(\S.*?))\s*$"#).unwrap()
});
static RE_BACKTICKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_DECISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bdecision[=:]\s*"?([a-z-]+)"#).unwrap());

/// What a rule constructor can see besides its own captures.
pub struct Scope<'a> {
    /// The text the cascade is matching (message or raw line).
    pub text: &'a str,
    pub roster: &'a Roster,
    /// Explicit identity from the structured record, if any.
    pub agent_hint: Option<&'a str>,
}

impl Scope<'_> {
    fn agent(&self) -> String {
        self.roster.resolve(self.agent_hint, self.text)
    }
}

/// One entry of the cascade: a pattern and the event it produces.
pub struct Rule {
    pub name: &'static str,
    pattern: &'static Lazy<Regex>,
    build: fn(&Captures<'_>, &Scope<'_>) -> DomainEvent,
}

/// The cascade, in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "approval-requested",
        pattern: &RE_APPROVAL_REQUESTED,
        build: approval_requested,
    },
    Rule {
        name: "approval-resolved",
        pattern: &RE_APPROVAL_RESOLVED,
        build: approval_resolved,
    },
    Rule {
        name: "tool-start",
        pattern: &RE_TOOL_START,
        build: tool_started,
    },
    Rule {
        name: "tool-end",
        pattern: &RE_TOOL_END,
        build: tool_ended,
    },
    Rule {
        name: "user-message",
        pattern: &RE_USER_MESSAGE,
        build: user_message,
    },
    Rule {
        name: "run-finished",
        pattern: &RE_RUN_FINISHED,
        build: run_finished,
    },
];

/// Run the cascade over `scope.text`; first match wins.
pub fn first_match(scope: &Scope<'_>) -> Option<(&'static str, DomainEvent)> {
    RULES.iter().find_map(|rule| {
        rule.pattern
            .captures(scope.text)
            .map(|caps| (rule.name, (rule.build)(&caps, scope)))
    })
}

fn approval_requested(_: &Captures<'_>, scope: &Scope<'_>) -> DomainEvent {
    let command = command_in(scope.text);
    let id = approval_id_in(scope.text).unwrap_or_else(|| derived_id(&command));
    DomainEvent::ApprovalRequested { id, command }
}

fn approval_resolved(caps: &Captures<'_>, scope: &Scope<'_>) -> DomainEvent {
    let verb = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
    let decision = RE_DECISION
        .captures(scope.text)
        .and_then(|c| Decision::from_str(&c[1].to_lowercase()))
        .or_else(|| Decision::from_str(&verb))
        .unwrap_or(Decision::AllowOnce);
    let id = approval_id_in(scope.text).unwrap_or_else(|| derived_id(&command_in(scope.text)));
    DomainEvent::ApprovalResolved { id, decision }
}

fn tool_started(caps: &Captures<'_>, scope: &Scope<'_>) -> DomainEvent {
    let tool = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map_or("tool", |m| m.as_str().trim_end_matches(['.', ':']))
        .to_string();
    DomainEvent::ToolStarted {
        agent: scope.agent(),
        tool,
    }
}

fn tool_ended(_: &Captures<'_>, scope: &Scope<'_>) -> DomainEvent {
    DomainEvent::ToolEnded {
        agent: scope.agent(),
    }
}

fn user_message(caps: &Captures<'_>, scope: &Scope<'_>) -> DomainEvent {
    let text = caps
        .get(1)
        .map(|m| m.as_str().trim().trim_matches('"').trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(scope.text)
        .to_string();
    DomainEvent::UserMessage { text }
}

fn run_finished(_: &Captures<'_>, _: &Scope<'_>) -> DomainEvent {
    DomainEvent::RunFinished
}

fn approval_id_in(text: &str) -> Option<String> {
    RE_APPROVAL_ID
        .captures(text)
        .map(|c| c[1].trim_end_matches(['.', ',', ':']).to_string())
        .filter(|id| !id.is_empty())
}

/// The command an approval is about: `command=`, then backticks, then the
/// whole text.
fn command_in(text: &str) -> String {
    if let Some(caps) = RE_COMMAND.captures(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            return m.as_str().trim().to_string();
        }
    }
    if let Some(caps) = RE_BACKTICKED.captures(text) {
        return caps[1].trim().to_string();
    }
    text.trim().to_string()
}

/// Stable id for approvals whose log line carries none, so repeated sightings
/// of the same command upsert one entry.
fn derived_id(command: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, command.as_bytes()).to_string()
}
