//! Flattening of the director's preference document into [`Preferences`].
use serde_json::{Map, Value};
use tracing::debug;

use scanr_model::{Preferences, keys};

use crate::errors::SyncError;

/// Envelope members that never become preferences.
const SKIPPED: &[&str] = &["created", "message_type", "group_id", "message_id"];

/// How a member's value is turned into one preference string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// Array elements joined with `,`.
    List,
    /// `oid` of every object in `single_vts`, joined with `;`.
    OidList,
}

struct Rule {
    source: &'static str,
    target: &'static str,
    join: Join,
}

/// Members with a fixed destination key. Anything else, or a member whose
/// shape does not match its rule, keeps its own name: scalars are stored
/// as-is, arrays are comma-joined, objects are dropped.
const RULES: &[Rule] = &[
    Rule {
        source: "hosts",
        target: keys::TARGET,
        join: Join::List,
    },
    Rule {
        source: "ports",
        target: keys::PORT_RANGE,
        join: Join::List,
    },
    Rule {
        source: "plugins",
        target: keys::PLUGIN_SET,
        join: Join::OidList,
    },
];

/// Parse a response payload into its top-level members.
///
/// Fails on malformed JSON, on a root that is not an object and on an
/// object without members.
pub fn parse_document(payload: &[u8]) -> Result<Map<String, Value>, SyncError> {
    let root: Value =
        serde_json::from_slice(payload).map_err(|e| SyncError::Parse(e.to_string()))?;

    let Value::Object(members) = root else {
        return Err(SyncError::Parse("document root is not an object".into()));
    };
    if members.is_empty() {
        return Err(SyncError::EmptyDocument);
    }
    Ok(members)
}

/// Parse `payload` and merge it into `prefs`. Returns the number of
/// preferences written.
pub fn apply_document(payload: &[u8], prefs: &Preferences) -> Result<usize, SyncError> {
    let members = parse_document(payload)?;
    Ok(apply_members(&members, prefs))
}

/// Merge already parsed members into `prefs`, overwriting existing keys.
pub fn apply_members(members: &Map<String, Value>, prefs: &Preferences) -> usize {
    let mut written = 0;
    for (key, value) in members {
        if SKIPPED.contains(&key.as_str()) {
            continue;
        }
        if let Some((target, resolved)) = resolve(key, value) {
            debug!(target: "scanr.sync", key = target, value = %resolved, "preference");
            prefs.set(target, resolved);
            written += 1;
        }
    }
    written
}

fn resolve<'a>(key: &'a str, value: &Value) -> Option<(&'a str, String)> {
    let rule = RULES.iter().find(|r| r.source == key);

    match (value, rule) {
        (Value::Array(items), Some(rule)) if rule.join == Join::List => {
            join_list(items).map(|v| (rule.target, v))
        }
        (Value::Array(items), _) => join_list(items).map(|v| (key, v)),
        (Value::Object(obj), Some(rule)) if rule.join == Join::OidList => {
            join_oids(obj).map(|v| (rule.target, v))
        }
        (Value::Object(_), _) => None,
        (scalar, _) => scalar_string(scalar).map(|v| (key, v)),
    }
}

/// String form of a scalar: strings verbatim, booleans as `yes`/`no`,
/// integers in decimal. Floats and `null` have none.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        _ => None,
    }
}

fn join_list(items: &[Value]) -> Option<String> {
    let parts: Vec<String> = items.iter().filter_map(scalar_string).collect();
    (!parts.is_empty()).then(|| parts.join(","))
}

fn join_oids(obj: &Map<String, Value>) -> Option<String> {
    let vts = obj.get("single_vts")?.as_array()?;
    let oids: Vec<&str> = vts
        .iter()
        .filter_map(|vt| vt.get("oid")?.as_str())
        .collect();
    (!oids.is_empty()).then(|| oids.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_ports_and_plugins() {
        let prefs = Preferences::new();
        let doc = br#"{"hosts":["a","b"],"ports":["80","443"],"plugins":{"single_vts":[{"oid":"1.1"},{"oid":"1.2"}]}}"#;

        let written = apply_document(doc, &prefs).unwrap();

        assert_eq!(written, 3);
        assert_eq!(prefs.get(keys::TARGET).as_deref(), Some("a,b"));
        assert_eq!(prefs.get(keys::PORT_RANGE).as_deref(), Some("80,443"));
        assert_eq!(prefs.get(keys::PLUGIN_SET).as_deref(), Some("1.1;1.2"));
        assert!(!prefs.contains("hosts"));
    }

    #[test]
    fn scalars() {
        let prefs = Preferences::new();
        let doc = br#"{
            "id": "scan-1",
            "checks_read_timeout": 5,
            "safe_checks": true,
            "unscanned_closed": false,
            "ratio": 0.5,
            "nothing": null
        }"#;

        assert_eq!(apply_document(doc, &prefs).unwrap(), 4);
        assert_eq!(prefs.get("id").as_deref(), Some("scan-1"));
        assert_eq!(prefs.get("checks_read_timeout").as_deref(), Some("5"));
        assert_eq!(prefs.get("safe_checks").as_deref(), Some("yes"));
        assert_eq!(prefs.get("unscanned_closed").as_deref(), Some("no"));
        assert!(!prefs.contains("ratio"));
        assert!(!prefs.contains("nothing"));
    }

    #[test]
    fn envelope_members_are_skipped() {
        let prefs = Preferences::new();
        let doc = br#"{"message_id":"m","group_id":"g","message_type":"scan","created":1,"id":"s"}"#;

        assert_eq!(apply_document(doc, &prefs).unwrap(), 1);
        assert_eq!(prefs.len(), 1);
    }

    #[test]
    fn overwrites_existing_values() {
        let prefs = Preferences::new();
        prefs.set(keys::TARGET, "old");
        prefs.set(keys::ALIVE_TEST, "2");

        apply_document(br#"{"hosts":["10.0.0.1"],"ALIVE_TEST":"16"}"#, &prefs).unwrap();

        assert_eq!(prefs.get(keys::TARGET).as_deref(), Some("10.0.0.1"));
        assert_eq!(prefs.get(keys::ALIVE_TEST).as_deref(), Some("16"));
    }

    #[test]
    fn other_arrays_keep_their_name() {
        let prefs = Preferences::new();
        apply_document(br#"{"exclude_hosts":["x", 7, true],"empty":[]}"#, &prefs).unwrap();

        assert_eq!(prefs.get("exclude_hosts").as_deref(), Some("x,7,yes"));
        assert!(!prefs.contains("empty"));
    }

    #[test]
    fn plugins_array_is_joined_under_its_own_name() {
        let prefs = Preferences::new();
        apply_document(br#"{"plugins":["1.1","1.2"]}"#, &prefs).unwrap();

        assert_eq!(prefs.get("plugins").as_deref(), Some("1.1,1.2"));
        assert!(!prefs.contains(keys::PLUGIN_SET));
    }

    #[test]
    fn unknown_objects_are_ignored() {
        let prefs = Preferences::new();
        let doc = br#"{"credentials":{"ssh":{"user":"u"}},"plugins":{"families":["x"]},"hosts":["h"]}"#;

        assert_eq!(apply_document(doc, &prefs).unwrap(), 1);
        assert!(!prefs.contains("credentials"));
        assert!(!prefs.contains(keys::PLUGIN_SET));
    }

    #[test]
    fn malformed_documents_fail() {
        let prefs = Preferences::new();

        assert!(matches!(
            apply_document(b"{not json", &prefs),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            apply_document(b"[1,2]", &prefs),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            apply_document(b"{}", &prefs),
            Err(SyncError::EmptyDocument)
        ));
        assert!(prefs.is_empty());
    }
}
