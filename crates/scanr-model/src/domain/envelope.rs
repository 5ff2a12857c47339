use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Message type asking the director for a scan's preferences.
pub const GET_SCAN: &str = "get.scan";

/// Common header wrapped around every message on the channel.
///
/// Each request gets a fresh `message_id` and `group_id`.
/// Payload fields are flattened next to the header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message_id: String,
    pub group_id: String,
    pub message_type: String,
    /// Seconds since the Unix epoch.
    pub created: i64,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(message_type: impl Into<String>, payload: T) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            group_id: uuid::Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            created,
            payload,
        }
    }
}

/// Payload naming a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRef {
    pub id: String,
}

impl Envelope<ScanRef> {
    /// Build a `get.scan` request for `scan_id`.
    pub fn get_scan(scan_id: impl Into<String>) -> Self {
        Self::new(GET_SCAN, ScanRef { id: scan_id.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_scan_has_fresh_ids() {
        let a = Envelope::get_scan("scan-1");
        let b = Envelope::get_scan("scan-1");

        assert_ne!(a.message_id, b.message_id);
        assert_ne!(a.group_id, b.group_id);
        assert_ne!(a.message_id, a.group_id);
        assert!(a.created > 0);
    }

    #[test]
    fn payload_is_flattened() {
        let msg = Envelope::get_scan("scan-1");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["message_type"], "get.scan");
        assert_eq!(value["id"], "scan-1");
        assert_eq!(value["message_id"], msg.message_id.as_str());
        assert!(value["created"].is_i64());
    }
}
