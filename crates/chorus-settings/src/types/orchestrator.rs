//! Agent roster and the user-facing strings the chunk processor writes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorSettings {
    /// Agent identifiers a send may target.
    pub agents: Vec<String>,
    /// Agent shown when nothing else was selected.
    pub default_agent: String,
    /// Content of the assistant placeholder before the first text arrives.
    pub working_placeholder: String,
    /// Final content when the channel produced no chunks at all.
    pub no_response_marker: String,
    /// Final content when chunks arrived but none carried text.
    pub no_content_marker: String,
    /// Content shown when the channel itself failed.
    pub generic_error: String,
    /// `status` chunk content that pauses the request for credentials.
    pub credential_sentinel: String,
    /// Status texts ending in one of these are transient progress lines.
    pub in_progress_suffixes: Vec<String>,
    /// Conversation titles are the first user message cut to this many chars.
    pub title_max_chars: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            agents: vec![
                "general".to_string(),
                "research".to_string(),
                "notes".to_string(),
                "mindmap".to_string(),
            ],
            default_agent: "general".to_string(),
            working_placeholder: "Working...".to_string(),
            no_response_marker: "Failed to get response".to_string(),
            no_content_marker: "No content in response".to_string(),
            generic_error: "Sorry, something went wrong while generating a response.".to_string(),
            credential_sentinel: "credentials_required".to_string(),
            in_progress_suffixes: vec!["...".to_string(), "\u{2026}".to_string()],
            title_max_chars: 50,
        }
    }
}
