//! Transport and storage settings.

use serde::{Deserialize, Serialize};

/// Agent endpoint the HTTP chunk source talks to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Streaming chat endpoint (SSE response).
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    /// Maximum silence between two body reads.
    pub idle_timeout_ms: u64,
    /// Optional bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/api/chat/stream".to_string(),
            connect_timeout_ms: 30_000,
            idle_timeout_ms: 90_000,
            bearer_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite file; relative paths resolve against `~/.chorus`.
    pub database_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_path: "conversations.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_omitted_when_absent() {
        let json = serde_json::to_value(ChannelSettings::default()).unwrap();
        assert!(json.get("bearerToken").is_none());
        assert_eq!(json["connectTimeoutMs"], 30_000);
    }
}
