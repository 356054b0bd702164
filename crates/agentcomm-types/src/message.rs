use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "agent")]
    Agent,
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

/// A single conversational turn.
///
/// Immutable once sent. Inbound `message`-kind events decode into the same
/// shape; agents that omit `content` decode to an empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Message {
    /// A user-role message with a generated message id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: default_content_type(),
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            role: Some(Role::User),
            context_id: None,
            task_id: None,
        }
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Fill in defaults a caller-constructed message may have left out:
    /// a generated message id, the user role, and an inherited context id.
    pub fn prepared(mut self, context_id: Option<&str>) -> Self {
        if self.message_id.is_none() {
            self.message_id = Some(uuid::Uuid::new_v4().to_string());
        }
        if self.role.is_none() {
            self.role = Some(Role::User);
        }
        if self.context_id.is_none() {
            self.context_id = context_id.map(str::to_string);
        }
        self
    }
}
