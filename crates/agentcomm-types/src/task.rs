use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::event::{TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

/// A2A task lifecycle state.
///
/// Terminal states: Completed, Failed, Cancelled, Rejected
/// Interrupted states: InputRequired, AuthRequired
/// Active states: Submitted, Working
///
/// `Unspecified` is the parse-failure sentinel: it is neither terminal,
/// interrupted, nor active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TaskState {
    Unspecified,
    Submitted,
    Working,
    Completed,
    Failed,
    Cancelled,
    InputRequired,
    Rejected,
    AuthRequired,
}

impl TaskState {
    /// Parse a task state from its string representation.
    ///
    /// Tolerates the formats agents actually emit:
    /// - `"completed"` (canonical)
    /// - `"COMPLETED"` (uppercase)
    /// - `"TaskState.completed"` (SDK enum repr)
    /// - `"input_required"` / `"input-required"` (underscore variants)
    /// - `"canceled"` (American spelling)
    ///
    /// Anything unrecognized classifies as [`TaskState::Unspecified`].
    pub fn classify(raw: &str) -> TaskState {
        let normalized = raw.trim().to_ascii_lowercase();

        // Strip an SDK-style "taskstate." prefix if present.
        let normalized = match normalized.rfind("taskstate.") {
            Some(idx) => &normalized[idx + "taskstate.".len()..],
            None => normalized.as_str(),
        };

        match normalized.replace('_', "-").as_str() {
            "submitted" => TaskState::Submitted,
            "working" => TaskState::Working,
            "completed" => TaskState::Completed,
            "failed" => TaskState::Failed,
            "cancelled" | "canceled" => TaskState::Cancelled,
            "input-required" => TaskState::InputRequired,
            "rejected" => TaskState::Rejected,
            "auth-required" => TaskState::AuthRequired,
            _ => TaskState::Unspecified,
        }
    }

    /// Canonical wire string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Unspecified => "unspecified",
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::InputRequired => "input-required",
            TaskState::Rejected => "rejected",
            TaskState::AuthRequired => "auth-required",
        }
    }

    /// Terminal: the task will not progress further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed
                | TaskState::Failed
                | TaskState::Cancelled
                | TaskState::Rejected
        )
    }

    /// Interrupted: the task is paused pending caller action.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskState::InputRequired | TaskState::AuthRequired)
    }

    /// Active: the task is progressing.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Submitted | TaskState::Working)
    }

    /// Content is ready to show the user (terminal or interrupted states).
    pub fn should_stream_content(&self) -> bool {
        self.is_terminal() || self.is_interrupted()
    }

    /// Only a progress indicator is appropriate (active states).
    pub fn should_show_status(&self) -> bool {
        self.is_active()
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// Terminal states are absorbing. Allowed moves: active → active,
    /// active → terminal, active → interrupted, interrupted → active,
    /// interrupted → terminal.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self.is_active() {
            return next.is_active() || next.is_terminal() || next.is_interrupted();
        }
        if self.is_interrupted() {
            return next.is_active() || next.is_terminal();
        }
        // Unspecified carries no history; accept any classified state.
        next != TaskState::Unspecified
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskState {
    /// Lenient decode: routes through [`TaskState::classify`] so an unknown
    /// state string becomes `Unspecified` instead of failing the payload.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskState::classify(&raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::new(TaskState::Unspecified)
    }
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
        }
    }
}

/// Server-side unit of asynchronous work.
///
/// Created by the remote agent on first submission; this subsystem never
/// deletes a task over the wire — entries are only evicted client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Pushed notifications may omit the status entirely; it defaults to
    /// the `Unspecified` sentinel.
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Concatenated text of every artifact part, in artifact-then-part order.
    pub fn artifact_text(&self) -> String {
        let mut out = String::new();
        for artifact in &self.artifacts {
            for part in &artifact.parts {
                if let Some(text) = part.text() {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// Apply a status update, honoring the absorbing-terminal invariant.
    ///
    /// Returns `false` when the update was refused (current state is
    /// terminal, or the transition is not permitted).
    pub fn apply_status_update(&mut self, update: &TaskStatusUpdateEvent) -> bool {
        if !self.status.state.can_transition_to(update.status.state) {
            return false;
        }
        self.status = update.status.clone();
        true
    }

    /// Apply an artifact update.
    ///
    /// Locates the artifact by id: if found and the update's `append` flag
    /// is set, parts are appended; otherwise the artifact is replaced
    /// wholesale. An unknown id is added as a new artifact either way.
    pub fn apply_artifact_update(&mut self, update: &TaskArtifactUpdateEvent) {
        let incoming = &update.artifact;
        match self
            .artifacts
            .iter_mut()
            .find(|a| a.artifact_id == incoming.artifact_id)
        {
            Some(existing) if update.append => {
                existing.parts.extend(incoming.parts.iter().cloned());
            }
            Some(existing) => {
                *existing = incoming.clone();
            }
            None => {
                self.artifacts.push(incoming.clone());
            }
        }
    }
}
