//! Observer channel messages.

use mission_deck_core::models::DeckSnapshot;
use serde::{Deserialize, Serialize};

/// Commands an observer may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObserverCommand {
    SubmitMission {
        #[serde(default, rename = "agentId")]
        agent_id: Option<String>,
        command: String,
    },
    ResolveApproval {
        id: String,
        allow: bool,
    },
}

/// Messages pushed to observers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObserverMessage<'a> {
    Snapshot { state: &'a DeckSnapshot },
    Error { message: String },
}

impl ObserverMessage<'_> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::error!("failed to encode observer message: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_submit_mission() {
        let command: ObserverCommand = serde_json::from_value(json!({
            "type": "submit-mission",
            "agentId": "samwise",
            "command": "summarize the logs"
        }))
        .unwrap();
        assert_eq!(
            command,
            ObserverCommand::SubmitMission {
                agent_id: Some("samwise".into()),
                command: "summarize the logs".into(),
            }
        );
    }

    #[test]
    fn agent_is_optional() {
        let command: ObserverCommand =
            serde_json::from_str(r#"{"type":"submit-mission","command":"go"}"#).unwrap();
        assert!(matches!(command, ObserverCommand::SubmitMission { agent_id: None, .. }));
    }

    #[test]
    fn parses_resolve_approval() {
        let command: ObserverCommand =
            serde_json::from_str(r#"{"type":"resolve-approval","id":"ap-1","allow":false}"#)
                .unwrap();
        assert_eq!(
            command,
            ObserverCommand::ResolveApproval {
                id: "ap-1".into(),
                allow: false,
            }
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_json::from_str::<ObserverCommand>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn error_message_shape() {
        let text = ObserverMessage::error("gateway is not connected").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "gateway is not connected"}));
    }
}
