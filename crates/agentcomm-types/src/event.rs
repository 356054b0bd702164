use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::jsonrpc::{JsonRpcError, JsonRpcResponse};
use crate::message::Message;
use crate::task::{Task, TaskStatus};

/// Status update event — emitted during streaming or pushed via webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "final")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

/// Artifact update event — chunk delivery during streaming.
///
/// `append` controls the merge: append parts to the artifact with the same
/// id, or replace it wholesale. Never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub artifact: Artifact,
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub last_chunk: bool,
}

/// Decoded protocol event, discriminated by the `kind` member.
///
/// `Error` is the odd one out: it comes from the envelope's `error` member
/// (or from an embedded transport failure) and serializes as
/// `{"error": {...}}` rather than a kind-tagged object.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Message(Message),
    Task(Task),
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
    Error(JsonRpcError),
}

impl AgentEvent {
    /// Decode a JSON-RPC response envelope into an event.
    ///
    /// An `error` member wins over `result`; an envelope carrying neither
    /// is a protocol error.
    pub fn from_response(response: JsonRpcResponse) -> Result<Self, serde_json::Error> {
        if let Some(error) = response.error {
            return Ok(AgentEvent::Error(error));
        }
        match response.result {
            Some(result) => Self::from_result(result),
            None => Err(serde_json::Error::custom(
                "envelope carries neither result nor error",
            )),
        }
    }

    /// Decode a bare result payload.
    pub fn from_result(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let obj = value
            .as_object()
            .ok_or_else(|| serde_json::Error::custom("event payload must be a JSON object"))?;

        if obj.contains_key("error") {
            let error: JsonRpcError = serde_json::from_value(obj["error"].clone())?;
            return Ok(AgentEvent::Error(error));
        }

        match obj.get("kind").and_then(|k| k.as_str()) {
            Some("message") => Ok(AgentEvent::Message(serde_json::from_value(value)?)),
            Some("task") => Ok(AgentEvent::Task(serde_json::from_value(value)?)),
            Some("status-update") => {
                Ok(AgentEvent::StatusUpdate(serde_json::from_value(value)?))
            }
            Some("artifact-update") => {
                Ok(AgentEvent::ArtifactUpdate(serde_json::from_value(value)?))
            }
            Some(other) => Err(serde_json::Error::custom(format!(
                "unknown event kind: {other}"
            ))),
            // Some agents omit "kind" on tasks/get-style payloads; fall back
            // to member presence.
            None if obj.contains_key("id") && obj.contains_key("status") => {
                Ok(AgentEvent::Task(serde_json::from_value(value)?))
            }
            None if obj.contains_key("content") => {
                Ok(AgentEvent::Message(serde_json::from_value(value)?))
            }
            None => Err(serde_json::Error::custom(
                "cannot determine event kind from payload",
            )),
        }
    }

    /// Wire form of the event.
    pub fn to_value(&self) -> serde_json::Value {
        fn tagged(kind: &str, value: serde_json::Value) -> serde_json::Value {
            let mut value = value;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("kind".into(), serde_json::Value::String(kind.into()));
            }
            value
        }
        match self {
            AgentEvent::Message(m) => {
                tagged("message", serde_json::to_value(m).unwrap_or_default())
            }
            AgentEvent::Task(t) => tagged("task", serde_json::to_value(t).unwrap_or_default()),
            AgentEvent::StatusUpdate(u) => {
                tagged("status-update", serde_json::to_value(u).unwrap_or_default())
            }
            AgentEvent::ArtifactUpdate(u) => tagged(
                "artifact-update",
                serde_json::to_value(u).unwrap_or_default(),
            ),
            AgentEvent::Error(e) => serde_json::json!({ "error": e }),
        }
    }

    /// The task id this event refers to, when it carries one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            AgentEvent::Message(m) => m.task_id.as_deref(),
            AgentEvent::Task(t) => Some(&t.id),
            AgentEvent::StatusUpdate(u) => Some(&u.task_id),
            AgentEvent::ArtifactUpdate(u) => Some(&u.task_id),
            AgentEvent::Error(_) => None,
        }
    }

    /// The conversation context id this event carries, if any.
    pub fn context_id(&self) -> Option<&str> {
        match self {
            AgentEvent::Message(m) => m.context_id.as_deref(),
            AgentEvent::Task(t) => t.context_id.as_deref(),
            AgentEvent::StatusUpdate(u) => u.context_id.as_deref(),
            AgentEvent::ArtifactUpdate(u) => u.context_id.as_deref(),
            AgentEvent::Error(_) => None,
        }
    }
}

impl Serialize for AgentEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AgentEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_result(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::JsonRpcId;
    use crate::task::TaskState;

    #[test]
    fn test_decode_message_event() {
        let json = r#"{"kind": "message", "content": "Hi", "contextId": "ctx-1"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match &event {
            AgentEvent::Message(m) => {
                assert_eq!(m.content, "Hi");
                assert_eq!(m.context_id.as_deref(), Some("ctx-1"));
            }
            other => panic!("Expected Message, got {other:?}"),
        }
        assert_eq!(event.context_id(), Some("ctx-1"));
    }

    #[test]
    fn test_decode_task_event() {
        let json = r#"{
            "kind": "task",
            "id": "t-1",
            "contextId": "ctx-1",
            "status": {"state": "working"},
            "artifacts": [{"artifactId": "a-1", "parts": [{"content": "x"}]}]
        }"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match &event {
            AgentEvent::Task(t) => {
                assert_eq!(t.id, "t-1");
                assert_eq!(t.status.state, TaskState::Working);
                assert_eq!(t.artifact_text(), "x");
            }
            other => panic!("Expected Task, got {other:?}"),
        }
        assert_eq!(event.task_id(), Some("t-1"));
    }

    #[test]
    fn test_decode_status_update_event() {
        let json = r#"{
            "kind": "status-update",
            "taskId": "t-1",
            "status": {"state": "input-required", "message": "need a file"},
            "final": false
        }"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::StatusUpdate(u) => {
                assert_eq!(u.task_id, "t-1");
                assert_eq!(u.status.state, TaskState::InputRequired);
                assert_eq!(u.status.message.as_deref(), Some("need a file"));
                assert_eq!(u.is_final, Some(false));
            }
            other => panic!("Expected StatusUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_artifact_update_defaults() {
        let json = r#"{
            "kind": "artifact-update",
            "taskId": "t-1",
            "artifact": {"artifactId": "a-1", "parts": [{"content": "chunk"}]}
        }"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::ArtifactUpdate(u) => {
                assert!(!u.append);
                assert!(!u.last_chunk);
                assert_eq!(u.artifact.text(), "chunk");
            }
            other => panic!("Expected ArtifactUpdate, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_kind_fails() {
        let json = r#"{"kind": "telemetry", "value": 1}"#;
        let result: Result<AgentEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_untagged_task_fallback() {
        // tasks/get-style payload without a "kind" member.
        let json = r#"{"id": "t-9", "status": {"state": "completed"}}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, AgentEvent::Task(_)));
    }

    #[test]
    fn test_from_response_error_member_wins() {
        let response = JsonRpcResponse::error(
            JsonRpcId::Number(1),
            JsonRpcError {
                code: -32001,
                message: "Task not found".into(),
                data: None,
            },
        );
        let event = AgentEvent::from_response(response).unwrap();
        match event {
            AgentEvent::Error(e) => assert_eq!(e.code, -32001),
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_empty_envelope_fails() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: None,
            id: JsonRpcId::Null,
        };
        assert!(AgentEvent::from_response(response).is_err());
    }

    #[test]
    fn test_embedded_error_object_decodes() {
        // The propagation policy embeds transport failures as
        // {"error": {...}} result payloads.
        let json = r#"{"error": {"code": -1, "message": "connection refused"}}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Error(e) => {
                assert_eq!(e.code, -1);
                assert!(e.message.contains("refused"));
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_serialize_roundtrip_kind_tag() {
        let event = AgentEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t-1".into(),
            context_id: None,
            status: TaskStatus::new(TaskState::Working),
            is_final: None,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"status-update\""));

        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, AgentEvent::StatusUpdate(_)));
    }

    #[test]
    fn test_serialize_error_shape() {
        let event = AgentEvent::Error(JsonRpcError {
            code: -32603,
            message: "boom".into(),
            data: None,
        });
        let json = serde_json::to_string(&event).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"]["code"], -32603);
        assert!(value.get("kind").is_none());
    }
}
