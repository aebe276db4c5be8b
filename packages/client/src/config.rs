//! Client configuration

use serde::{Deserialize, Serialize};

use crate::machine::DEFAULT_COMMIT_GRACE_MS;
use crate::transport::ReconnectPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:4747/ws`
    pub url: String,

    /// Prefix for request ids
    #[serde(default = "default_session_id")]
    pub session_id: String,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Send a ping on this interval while connected
    #[serde(default)]
    pub heartbeat_ms: Option<u64>,

    /// How long committed edits stay visible
    #[serde(default = "default_commit_grace_ms")]
    pub commit_grace_ms: u64,
}

fn default_session_id() -> String {
    format!("loupe-{}", chrono::Utc::now().timestamp_millis())
}

fn default_commit_grace_ms() -> u64 {
    DEFAULT_COMMIT_GRACE_MS
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: default_session_id(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_ms: None,
            commit_grace_ms: DEFAULT_COMMIT_GRACE_MS,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_heartbeat_ms(mut self, heartbeat_ms: u64) -> Self {
        self.heartbeat_ms = Some(heartbeat_ms);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_json(r#"{ "url": "ws://localhost:4747/ws" }"#).unwrap();
        assert!(config.session_id.starts_with("loupe-"));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        assert_eq!(config.reconnect.max_delay_ms, 10000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.commit_grace_ms, 1500);
        assert!(config.heartbeat_ms.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_json(
            r#"{
                "url": "ws://x/ws",
                "sessionId": "tab-1",
                "reconnect": { "maxAttempts": 2 },
                "heartbeatMs": 5000
            }"#,
        )
        .unwrap();
        assert_eq!(config.session_id, "tab-1");
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        assert_eq!(config.heartbeat_ms, Some(5000));
    }
}
