//! Well-known preference names and shared-store key layout.

/// Comma separated target list.
pub const TARGET: &str = "TARGET";
/// Comma separated port range.
pub const PORT_RANGE: &str = "port_range";
/// `;` separated list of plugin OIDs selected for the scan.
pub const PLUGIN_SET: &str = "plugin_set";
/// Liveness-test mode.
pub const ALIVE_TEST: &str = "ALIVE_TEST";

pub const PLUGINS_FOLDER: &str = "plugins_folder";
pub const INCLUDE_FOLDERS: &str = "include_folders";
pub const PLUGINS_TIMEOUT: &str = "plugins_timeout";
pub const SCANNER_PLUGINS_TIMEOUT: &str = "scanner_plugins_timeout";
pub const DB_ADDRESS: &str = "db_address";

pub const MQTT_SERVER_URI: &str = "mqtt_server_uri";
pub const MQTT_CONTEXT: &str = "mqtt_context";
pub const SYNC_TIMEOUT_MS: &str = "sync_timeout_ms";

pub const VENDOR_VERSION: &str = "vendor_version";
pub const DEBUG_TLS: &str = "debug_tls";

pub const MAX_HOSTS: &str = "max_hosts";
pub const MAX_CHECKS: &str = "max_checks";
pub const MAX_SYSLOAD: &str = "max_sysload";
pub const MIN_FREE_MEM: &str = "min_free_mem";

pub const LOG_LEVEL: &str = "log_level";
pub const LOG_FORMAT: &str = "log_format";

/// Shared-store key holding the pid of the command spawned by process `caller_pid`.
pub fn child_key(caller_pid: u32) -> String {
    format!("internal/child/{caller_pid}")
}

/// Shared-store key holding the top-level pid of scan `scan_id`.
pub fn scan_key(scan_id: &str) -> String {
    format!("internal/{scan_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_keys_layout() {
        assert_eq!(child_key(4242), "internal/child/4242");
        assert_eq!(scan_key("a1b2"), "internal/a1b2");
    }
}
