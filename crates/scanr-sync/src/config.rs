use std::time::Duration;

use scanr_model::{Preferences, keys};

/// Messaging context used when `mqtt_context` is not configured.
pub const DEFAULT_CONTEXT: &str = "eulabeia";
/// Wait bound for the director's reply when `sync_timeout_ms` is not configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Topic prefix shared with the director.
    pub context: String,
    /// Upper bound for the reply; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT.to_string(),
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        }
    }
}

impl SyncConfig {
    /// Read `mqtt_context` and `sync_timeout_ms`; `0` disables the timeout.
    pub fn from_preferences(prefs: &Preferences) -> Self {
        let context = prefs
            .get(keys::MQTT_CONTEXT)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());

        let timeout = match prefs.get_int(keys::SYNC_TIMEOUT_MS) {
            Some(0) => None,
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
            _ => Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        };

        Self { context, timeout }
    }

    /// Topic the `get.scan` request is published to.
    pub fn command_topic(&self) -> String {
        format!("{}/scan/cmd/director", self.context)
    }

    /// Topic the director answers on.
    pub fn info_topic(&self) -> String {
        format!("{}/scan/info", self.context)
    }
}
