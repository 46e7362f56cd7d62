//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial JSON file only needs the keys it changes.

mod channel;
mod orchestrator;

pub use channel::*;
pub use orchestrator::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "orchestrator": { "defaultAgent": "research" },
///   "channel": { "endpoint": "http://localhost:9000/api/chat/stream" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChorusSettings {
    /// Settings schema version.
    pub version: String,
    pub orchestrator: OrchestratorSettings,
    pub channel: ChannelSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            orchestrator: OrchestratorSettings::default(),
            channel: ChannelSettings::default(),
            store: StoreSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Log output configuration. `RUST_LOG` still wins over `level` at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Base level: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Per-target overrides, e.g. `[["chorus_engine", "debug"]]`.
    pub module_levels: Vec<(String, String)>,
    /// Emit JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: Vec::new(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_serialize_camel_case() {
        let json = serde_json::to_value(ChorusSettings::default()).unwrap();
        assert!(json["orchestrator"]["defaultAgent"].is_string());
        assert!(json["channel"]["idleTimeoutMs"].is_number());
        assert!(json["store"]["databasePath"].is_string());
        assert_eq!(json["logging"]["json"], false);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ChorusSettings =
            serde_json::from_str(r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.logging.json);
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.orchestrator.default_agent, "general");
    }

    #[test]
    fn module_levels_round_trip() {
        let settings: ChorusSettings = serde_json::from_str(
            r#"{"logging": {"moduleLevels": [["chorus_engine", "trace"]]}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.logging.module_levels,
            vec![("chorus_engine".to_string(), "trace".to_string())]
        );
    }
}
