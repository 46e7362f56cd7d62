use chorus_core::ids::AgentId;
use chorus_core::messages::StatusKind;
use chorus_settings::OrchestratorSettings;

/// Roster and user-facing strings used by the orchestrator and the fold.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub agents: Vec<AgentId>,
    pub default_agent: AgentId,
    pub working_placeholder: String,
    pub no_response_marker: String,
    pub no_content_marker: String,
    pub generic_error: String,
    pub credential_sentinel: String,
    pub in_progress_suffixes: Vec<String>,
    pub title_max_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&OrchestratorSettings::default())
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(s: &OrchestratorSettings) -> Self {
        Self {
            agents: s.agents.iter().map(AgentId::new).collect(),
            default_agent: AgentId::new(&s.default_agent),
            working_placeholder: s.working_placeholder.clone(),
            no_response_marker: s.no_response_marker.clone(),
            no_content_marker: s.no_content_marker.clone(),
            generic_error: s.generic_error.clone(),
            credential_sentinel: s.credential_sentinel.clone(),
            in_progress_suffixes: s.in_progress_suffixes.clone(),
            title_max_chars: s.title_max_chars,
        }
    }
}

impl OrchestratorConfig {
    pub fn is_known_agent(&self, agent_id: &AgentId) -> bool {
        self.agents.contains(agent_id)
    }

    /// Progress lines ("Searching the web...") are transient; anything else
    /// stays in the transcript.
    pub fn classify_status(&self, text: &str) -> StatusKind {
        let trimmed = text.trim_end();
        if self
            .in_progress_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && trimmed.ends_with(suffix.as_str()))
        {
            StatusKind::InProgress
        } else {
            StatusKind::Terminal
        }
    }

    /// Conversation title derived from the first user message.
    pub fn title_for(&self, text: &str) -> String {
        let trimmed = text.trim();
        match trimmed.char_indices().nth(self.title_max_chars) {
            Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
            None => trimmed.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_comes_from_settings() {
        let config = OrchestratorConfig::default();
        assert!(config.is_known_agent(&AgentId::new("research")));
        assert!(!config.is_known_agent(&AgentId::new("billing")));
        assert!(config.is_known_agent(&config.default_agent));
    }

    #[test]
    fn status_classification_by_suffix() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.classify_status("Searching the web..."), StatusKind::InProgress);
        assert_eq!(config.classify_status("Reading notes\u{2026}"), StatusKind::InProgress);
        assert_eq!(config.classify_status("Found 3 sources"), StatusKind::Terminal);
        assert_eq!(config.classify_status("Searching... "), StatusKind::InProgress);
    }

    #[test]
    fn title_is_truncated_on_char_boundary() {
        let config = OrchestratorConfig {
            title_max_chars: 5,
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.title_for("  héllo world  "), "héllo");
        assert_eq!(config.title_for("hi"), "hi");
        assert_eq!(config.title_for("abcd efgh"), "abcd");
    }
}
