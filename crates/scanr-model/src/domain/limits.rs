use crate::{Preferences, keys};

/// Resource limits handed to the attack network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Hosts scanned in parallel.
    pub max_hosts: u32,
    /// Checks run in parallel against one host.
    pub max_checks: u32,
    /// Load average above which no new checks are started (`0` = unlimited).
    pub max_sysload: u32,
    /// Free memory in MiB required to start new checks (`0` = unlimited).
    pub min_free_mem: u32,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_hosts: 15,
            max_checks: 10,
            max_sysload: 0,
            min_free_mem: 0,
        }
    }
}

impl ScanLimits {
    /// Read limits from preferences.
    ///
    /// Missing, unparsable or non-positive values keep the default.
    pub fn from_preferences(prefs: &Preferences) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, fallback: u32| {
            prefs
                .get_int(key)
                .filter(|v| *v > 0)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback)
        };

        Self {
            max_hosts: positive(keys::MAX_HOSTS, defaults.max_hosts),
            max_checks: positive(keys::MAX_CHECKS, defaults.max_checks),
            max_sysload: positive(keys::MAX_SYSLOAD, defaults.max_sysload),
            min_free_mem: positive(keys::MIN_FREE_MEM, defaults.min_free_mem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_preferences_give_defaults() {
        assert_eq!(
            ScanLimits::from_preferences(&Preferences::new()),
            ScanLimits::default()
        );
    }

    #[test]
    fn non_positive_values_fall_back() {
        let prefs = Preferences::new();
        prefs.set(keys::MAX_HOSTS, "0");
        prefs.set(keys::MAX_CHECKS, "-3");
        prefs.set(keys::MAX_SYSLOAD, "abc");
        prefs.set(keys::MIN_FREE_MEM, "512");

        let limits = ScanLimits::from_preferences(&prefs);
        assert_eq!(limits.max_hosts, 15);
        assert_eq!(limits.max_checks, 10);
        assert_eq!(limits.max_sysload, 0);
        assert_eq!(limits.min_free_mem, 512);
    }
}
