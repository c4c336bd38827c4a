//! Control channel frames.
//!
//! Outbound requests are `{"id", "method", "params"}`. Inbound frames are
//! either a reply `{"id", "ok", "result" | "error"}` or an unsolicited event
//! `{"event", "data"}`.

use chrono::Utc;
use mission_deck_core::models::{ApprovalRequest, Decision, DomainEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_APPROVAL_REQUESTED: &str = "exec.approval.requested";
pub const EVENT_APPROVAL_RESOLVED: &str = "exec.approval.resolved";
pub const METHOD_RESOLVE_APPROVAL: &str = "exec.approval.resolve";

#[derive(Debug, Serialize)]
pub struct RequestFrame<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Reply {
        id: u64,
        outcome: Result<Value, String>,
    },
    Event {
        name: String,
        data: Value,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<Value>,
    ok: Option<bool>,
    result: Option<Value>,
    error: Option<Value>,
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Parse one inbound text frame. Frames that are neither a reply nor an
/// event are ignored.
pub fn parse_inbound(text: &str) -> Option<Inbound> {
    let frame: RawFrame = serde_json::from_str(text).ok()?;

    if let Some(name) = frame.event {
        return Some(Inbound::Event {
            name,
            data: frame.data,
        });
    }

    let id = match frame.id? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    let failed = frame.ok == Some(false) || frame.error.as_ref().is_some_and(|e| !e.is_null());
    let outcome = if failed {
        Err(error_message(frame.error.as_ref()))
    } else {
        Ok(frame.result.unwrap_or(Value::Null))
    };
    Some(Inbound::Reply { id, outcome })
}

fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) if !other.is_null() => other.to_string(),
        _ => "request failed".to_string(),
    }
}

/// What an unsolicited event means for the deck.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    ApprovalRequested(ApprovalRequest),
    ApprovalResolved(DomainEvent),
}

/// Map a named event to a deck update. Unknown events yield `None`.
pub fn interpret_event(name: &str, data: &Value) -> Option<GatewayEvent> {
    match name {
        EVENT_APPROVAL_REQUESTED => {
            let id = string_field(data, "id")?;
            let request = data.get("request");
            let command = request
                .and_then(|r| string_field(r, "command"))
                .or_else(|| string_field(data, "command"))
                .unwrap_or_default();
            let agent = request
                .and_then(|r| string_field(r, "agentId").or_else(|| string_field(r, "sessionKey")))
                .or_else(|| string_field(data, "agentId"));

            let mut approval = ApprovalRequest::new(id, command, Utc::now());
            approval.agent = agent;
            Some(GatewayEvent::ApprovalRequested(approval))
        }
        EVENT_APPROVAL_RESOLVED => {
            let id = string_field(data, "id")?;
            let decision = string_field(data, "decision")
                .and_then(|d| Decision::from_str(&d))
                .unwrap_or(Decision::AllowOnce);
            Some(GatewayEvent::ApprovalResolved(DomainEvent::ApprovalResolved {
                id,
                decision,
            }))
        }
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_success_reply() {
        let inbound = parse_inbound(r#"{"id":7,"ok":true,"result":{"status":"ok"}}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Reply {
                id: 7,
                outcome: Ok(json!({"status": "ok"}))
            }
        );
    }

    #[test]
    fn parses_error_reply() {
        let inbound =
            parse_inbound(r#"{"id":"3","ok":false,"error":{"message":"unknown approval"}}"#)
                .unwrap();
        assert_eq!(
            inbound,
            Inbound::Reply {
                id: 3,
                outcome: Err("unknown approval".into())
            }
        );
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_inbound("not json"), None);
        assert_eq!(parse_inbound(r#"{"hello":"world"}"#), None);
    }

    #[test]
    fn approval_requested_event_carries_agent() {
        let data = json!({
            "id": "ap-9",
            "request": {"command": "git push", "sessionKey": "agent:frodo:main"}
        });
        let Some(GatewayEvent::ApprovalRequested(request)) =
            interpret_event(EVENT_APPROVAL_REQUESTED, &data)
        else {
            panic!("expected approval request");
        };
        assert_eq!(request.id, "ap-9");
        assert_eq!(request.command, "git push");
        assert_eq!(request.agent.as_deref(), Some("agent:frodo:main"));
    }

    #[test]
    fn approval_resolved_event_maps_decision() {
        let data = json!({"id": "ap-9", "decision": "deny"});
        assert_eq!(
            interpret_event(EVENT_APPROVAL_RESOLVED, &data),
            Some(GatewayEvent::ApprovalResolved(DomainEvent::ApprovalResolved {
                id: "ap-9".into(),
                decision: Decision::Deny,
            }))
        );
    }

    #[test]
    fn unknown_events_are_ignored() {
        assert_eq!(interpret_event("presence", &json!({})), None);
        assert_eq!(interpret_event(EVENT_APPROVAL_RESOLVED, &json!({})), None);
    }
}
