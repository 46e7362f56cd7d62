//! Layered settings resolution.
//!
//! Compiled defaults, then `~/.chorus/settings.json` merged key by key, then
//! `CHORUS_*` environment variables, then [`validate`]. In the file layer an
//! object merges into the default object, while arrays and scalars replace
//! it outright and `null` leaves the default in place.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ChorusSettings;

/// `~/.chorus`, falling back to `/tmp/.chorus` without a `HOME`.
pub fn chorus_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".chorus")
}

pub fn settings_path() -> PathBuf {
    chorus_home().join("settings.json")
}

pub fn load_settings() -> Result<ChorusSettings> {
    load_settings_from_path(&settings_path())
}

/// A missing file means "defaults"; an unreadable or malformed one is an
/// error rather than a silent fallback.
pub fn load_settings_from_path(path: &Path) -> Result<ChorusSettings> {
    let mut layered = serde_json::to_value(ChorusSettings::default())?;

    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let overlay: Value = serde_json::from_str(&raw)?;
            debug!(path = %path.display(), "applying settings file");
            layered = deep_merge(layered, overlay);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file");
        }
        Err(e) => return Err(e.into()),
    }

    let mut settings: ChorusSettings = serde_json::from_value(layered)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Merge `overlay` into `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_maps(base, overlay)),
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn merge_maps(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, incoming) in overlay {
        if incoming.is_null() {
            continue;
        }
        let merged = match base.remove(&key) {
            Some(existing) => deep_merge(existing, incoming),
            None => incoming,
        };
        base.insert(key, merged);
    }
    base
}

/// Cross-field checks the orchestrator relies on.
pub fn validate(settings: &ChorusSettings) -> Result<()> {
    let orch = &settings.orchestrator;
    if orch.agents.is_empty() {
        return Err(SettingsError::InvalidValue("agent roster is empty".into()));
    }
    if !orch.agents.iter().any(|a| a == &orch.default_agent) {
        return Err(SettingsError::InvalidValue(format!(
            "default agent '{}' is not in the roster",
            orch.default_agent
        )));
    }
    if orch.title_max_chars == 0 {
        return Err(SettingsError::InvalidValue("titleMaxChars must be positive".into()));
    }
    Ok(())
}

/// Relative database paths live under [`chorus_home`].
pub fn resolve_database_path(settings: &ChorusSettings) -> PathBuf {
    let configured = Path::new(&settings.store.database_path);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        chorus_home().join(configured)
    }
}

/// Environment layer. A value that fails to parse keeps the previous layer's
/// value and logs a warning.
pub fn apply_env_overrides(settings: &mut ChorusSettings) {
    let orch = &mut settings.orchestrator;
    if let Some(agent) = env_text("CHORUS_DEFAULT_AGENT") {
        orch.default_agent = agent;
    }
    if let Some(roster) = env_text("CHORUS_AGENTS") {
        orch.agents = parse_list(&roster);
    }
    if let Some(n) = env_parsed("CHORUS_TITLE_MAX_CHARS", |v| parse_bounded(v, 1..=1_000)) {
        orch.title_max_chars = n;
    }

    let channel = &mut settings.channel;
    if let Some(url) = env_text("CHORUS_ENDPOINT") {
        channel.endpoint = url;
    }
    if let Some(ms) = env_parsed("CHORUS_CONNECT_TIMEOUT_MS", |v| parse_bounded(v, 100..=600_000)) {
        channel.connect_timeout_ms = ms;
    }
    if let Some(ms) = env_parsed("CHORUS_IDLE_TIMEOUT_MS", |v| parse_bounded(v, 100..=3_600_000)) {
        channel.idle_timeout_ms = ms;
    }
    if let Some(token) = env_text("CHORUS_TOKEN") {
        channel.bearer_token = Some(token);
    }

    if let Some(path) = env_text("CHORUS_DB_PATH") {
        settings.store.database_path = path;
    }
    if let Some(level) = env_text("CHORUS_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(json) = env_parsed("CHORUS_LOG_JSON", parse_bool) {
        settings.logging.json = json;
    }
}

/// `true/1/yes/on` and `false/0/no/off`, any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and keep it only if it falls inside `range`.
pub fn parse_bounded<T>(raw: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse::<T>().ok().filter(|n| range.contains(n))
}

/// Comma separated list; blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_text(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = env_text(name)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key = name, value = %raw, "ignoring unparseable environment override");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_settings(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn objects_merge_per_key() {
        let merged = deep_merge(
            json!({"channel": {"endpoint": "http://a", "idleTimeoutMs": 10}}),
            json!({"channel": {"endpoint": "http://b"}, "extra": true}),
        );
        assert_eq!(
            merged,
            json!({"channel": {"endpoint": "http://b", "idleTimeoutMs": 10}, "extra": true})
        );
    }

    #[test]
    fn arrays_and_scalars_replace() {
        let merged = deep_merge(
            json!({"agents": ["general", "research"], "limits": {"n": 1}}),
            json!({"agents": ["notes"], "limits": 5}),
        );
        assert_eq!(merged["agents"], json!(["notes"]));
        assert_eq!(merged["limits"], 5);
    }

    #[test]
    fn null_keeps_base() {
        let merged = deep_merge(json!({"level": "info"}), json!({"level": null}));
        assert_eq!(merged["level"], "info");
        assert_eq!(deep_merge(json!(3), Value::Null), json!(3));
    }

    #[test]
    fn no_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        let defaults = ChorusSettings::default();
        assert_eq!(settings.orchestrator.agents, defaults.orchestrator.agents);
        assert_eq!(settings.channel.endpoint, defaults.channel.endpoint);
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let (_dir, path) = write_settings(
            r#"{"orchestrator": {"workingPlaceholder": "Thinking..."}, "channel": {"idleTimeoutMs": 5000}}"#,
        );
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.orchestrator.working_placeholder, "Thinking...");
        assert_eq!(settings.orchestrator.title_max_chars, 50);
        assert_eq!(settings.channel.idle_timeout_ms, 5000);
        assert_eq!(settings.channel.connect_timeout_ms, 30_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = write_settings("{ agents: ");
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn default_agent_must_be_on_roster() {
        let (_dir, path) = write_settings(r#"{"orchestrator": {"agents": ["research"]}}"#);
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("general"));
    }

    #[test]
    fn empty_roster_rejected() {
        let mut settings = ChorusSettings::default();
        settings.orchestrator.agents.clear();
        assert!(matches!(validate(&settings), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn database_path_resolution() {
        let mut settings = ChorusSettings::default();
        assert!(resolve_database_path(&settings).ends_with(".chorus/conversations.db"));

        settings.store.database_path = "/var/lib/chorus/c.db".into();
        assert_eq!(resolve_database_path(&settings), PathBuf::from("/var/lib/chorus/c.db"));
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }

    #[test]
    fn bounded_numbers() {
        assert_eq!(parse_bounded::<u64>("30000", 100..=600_000), Some(30_000));
        assert_eq!(parse_bounded::<u64>("99", 100..=600_000), None);
        assert_eq!(parse_bounded::<usize>("1000", 1..=1_000), Some(1_000));
        assert_eq!(parse_bounded::<usize>("-3", 1..=1_000), None);
    }

    #[test]
    fn list_drops_blanks() {
        assert_eq!(parse_list(" general, research ,,notes"), vec!["general", "research", "notes"]);
        assert!(parse_list(" , ").is_empty());
    }
}
