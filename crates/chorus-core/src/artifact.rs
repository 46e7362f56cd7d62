use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Markdown,
    Json,
    Diff,
    Log,
    Text,
}

impl ArtifactKind {
    /// Unknown or missing kinds degrade to plain text.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("code") => Self::Code,
            Some("markdown") | Some("md") => Self::Markdown,
            Some("json") => Self::Json,
            Some("diff") | Some("patch") => Self::Diff,
            Some("log") => Self::Log,
            _ => Self::Text,
        }
    }
}

/// Structured content extracted from an `artifact` chunk.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: ArtifactKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing() {
        assert_eq!(ArtifactKind::parse(Some("code")), ArtifactKind::Code);
        assert_eq!(ArtifactKind::parse(Some("Markdown")), ArtifactKind::Markdown);
        assert_eq!(ArtifactKind::parse(Some("patch")), ArtifactKind::Diff);
        assert_eq!(ArtifactKind::parse(Some("spreadsheet")), ArtifactKind::Text);
        assert_eq!(ArtifactKind::parse(None), ArtifactKind::Text);
    }
}
