//! Tier 1: structured log records.
//!
//! The gateway logs one JSON object per line. Two shapes show up:
//!
//! - named: `{"level":"info","subsystem":"agent","msg":"...","sessionKey":"..."}`
//! - positional: `{"0":"{\"subsystem\":\"gateway/ws\"}","1":"message","_meta":{...}}`
//!
//! In the positional shape a leading JSON object (inline or as a string)
//! carries metadata; the remaining positionals are the message.

use serde_json::{Map, Value};

const IDENTITY_KEYS: &[&str] = &["agentId", "agent", "sessionKey", "session"];
const MESSAGE_KEYS: &[&str] = &["msg", "message"];

/// The useful parts of a structured record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub message: String,
    pub subsystem: Option<String>,
    /// Explicit identity field, if the record carried one.
    pub agent_hint: Option<String>,
}

/// Parse a line as a structured record.
///
/// Returns `None` for anything that is not a JSON object, so the caller can
/// fall back to matching the raw text.
pub fn parse_structured(line: &str) -> Option<ParsedRecord> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let Value::Object(obj) = serde_json::from_str::<Value>(line).ok()? else {
        return None;
    };

    let positionals = positionals(&obj);
    let (meta, parts) = match positionals.split_first() {
        Some((first, rest)) => match as_object(first) {
            Some(meta) => (Some(meta), rest),
            None => (None, positionals.as_slice()),
        },
        None => (None, positionals.as_slice()),
    };

    let message = MESSAGE_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| join_parts(parts));

    let meta_field = |key: &str| -> Option<String> {
        meta.as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let subsystem = meta_field("subsystem")
        .or_else(|| string_field(&obj, "subsystem"))
        .or_else(|| string_field(&obj, "module"))
        .or_else(|| {
            obj.get("_meta")
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    let agent_hint = identity_in(&obj)
        .or_else(|| meta.as_ref().and_then(identity_in))
        .or_else(|| obj.get("_meta").and_then(Value::as_object).and_then(identity_in))
        .or_else(|| {
            parts
                .iter()
                .filter_map(as_object)
                .find_map(|o| identity_in(&o))
        });

    Some(ParsedRecord {
        message,
        subsystem,
        agent_hint,
    })
}

/// Values under `"0"`, `"1"`, ... in index order, stopping at the first gap.
fn positionals(obj: &Map<String, Value>) -> Vec<Value> {
    (0..)
        .map_while(|i: usize| obj.get(&i.to_string()).cloned())
        .collect()
}

/// An object inline, or a string holding a JSON object.
fn as_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) if s.trim_start().starts_with('{') => {
            match serde_json::from_str::<Value>(s).ok()? {
                Value::Object(map) => Some(map),
                _ => None,
            }
        }
        _ => None,
    }
}

fn join_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn identity_in(obj: &Map<String, Value>) -> Option<String> {
    IDENTITY_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
