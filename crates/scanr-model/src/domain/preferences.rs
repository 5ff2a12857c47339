use std::{
    collections::BTreeMap,
    fmt::Write as _,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{error::PreferenceError, keys};

/// Values installed before anything else touches the store.
pub const DEFAULT_PREFERENCES: &[(&str, &str)] = &[
    (keys::PLUGINS_FOLDER, "/var/lib/openvas/plugins"),
    (keys::INCLUDE_FOLDERS, "/var/lib/openvas/plugins"),
    (keys::PLUGINS_TIMEOUT, "320"),
    (keys::SCANNER_PLUGINS_TIMEOUT, "36000"),
    (keys::DB_ADDRESS, "/run/redis/redis.sock"),
];

/// Process-scoped preference store.
///
/// A flat string-to-string map: keys are unique and the last writer wins.
/// Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct Preferences {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl Preferences {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with [`DEFAULT_PREFERENCES`].
    pub fn with_defaults() -> Self {
        let prefs = Self::new();
        prefs.apply_defaults();
        prefs
    }

    /// Install the built-in defaults, overwriting existing entries.
    pub fn apply_defaults(&self) {
        for (key, value) in DEFAULT_PREFERENCES {
            self.set(*key, *value);
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    /// Parse the value under `key` as an integer.
    ///
    /// Leading/trailing whitespace is ignored; unparsable values read as `None`.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key)
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.clone()
    }

    /// Load `key = value` lines from a config file.
    ///
    /// Returns the number of entries applied.
    pub fn load_file(&self, path: &Path) -> Result<usize, PreferenceError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PreferenceError::NotFound(path.to_path_buf()),
            _ => PreferenceError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Ok(self.load_str(&content))
    }

    /// Apply `key = value` lines.
    ///
    /// Blank lines, `#`/`;` comments and `[section]` headers are skipped.
    /// Lines without `=` or with an empty key are skipped as well.
    /// Returns the number of entries applied.
    pub fn load_str(&self, content: &str) -> usize {
        let mut applied = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with(';')
                || (line.starts_with('[') && line.ends_with(']'))
            {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            self.set(key, value.trim());
            applied += 1;
        }
        applied
    }

    /// Render the store as sorted `key = value` lines.
    pub fn dump(&self) -> String {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for (key, value) in map.iter() {
            let _ = writeln!(out, "{key} = {value}");
        }
        out
    }
}
