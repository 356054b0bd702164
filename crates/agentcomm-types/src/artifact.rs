use serde::{Deserialize, Serialize};

/// Part content — discriminated by JSON member presence (no "kind" field).
///
/// Agents emit literal text as `{"content": "..."}`; structured payloads
/// arrive as `{"data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartContent {
    /// Literal text content
    Text { content: String },
    /// Structured JSON data
    Data { data: serde_json::Value },
}

/// Content unit within an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(flatten)]
    pub content: PartContent,
}

impl Part {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: PartContent::Text {
                content: text.into(),
            },
        }
    }

    /// Literal text of this part, if it carries any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            PartContent::Text { content } => Some(content),
            PartContent::Data { .. } => None,
        }
    }
}

/// Named, ordered collection of content parts produced by a task.
///
/// Within one task, `artifact_id` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Concatenated text of every part, in order.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_serde() {
        let part = Part::from_text("Hello");
        let json = serde_json::to_string(&part).unwrap();
        assert_eq!(json, r#"{"content":"Hello"}"#);

        let deserialized: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.text(), Some("Hello"));
    }

    #[test]
    fn test_data_part_serde() {
        let json = r#"{"data": {"rows": [1, 2, 3]}}"#;
        let part: Part = serde_json::from_str(json).unwrap();
        assert!(part.text().is_none());
        match &part.content {
            PartContent::Data { data } => assert_eq!(data["rows"][2], 3),
            _ => panic!("Expected Data content"),
        }
    }

    #[test]
    fn test_artifact_text_skips_non_text_parts() {
        let artifact = Artifact {
            artifact_id: "a-1".into(),
            parts: vec![
                Part::from_text("alpha "),
                Part {
                    content: PartContent::Data {
                        data: serde_json::json!({"ignored": true}),
                    },
                },
                Part::from_text("beta"),
            ],
        };
        assert_eq!(artifact.text(), "alpha beta");
    }

    #[test]
    fn test_artifact_from_json_missing_parts() {
        let json = r#"{"artifactId": "a-empty"}"#;
        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.artifact_id, "a-empty");
        assert!(artifact.parts.is_empty());
        assert_eq!(artifact.text(), "");
    }
}
