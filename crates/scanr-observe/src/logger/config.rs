use std::io::IsTerminal;

use scanr_model::{Preferences, keys};

use crate::logger::{error::LoggerError, format::LoggerFormat, level::LoggerLevel};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: LoggerLevel::default(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Overlay `log_format` / `log_level` preferences on the defaults.
    pub fn from_preferences(prefs: &Preferences) -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Some(format) = prefs.get(keys::LOG_FORMAT) {
            cfg.format = format.parse()?;
        }
        if let Some(level) = prefs.get(keys::LOG_LEVEL) {
            cfg.level = LoggerLevel::new(level)?;
        }
        if cfg.format == LoggerFormat::Json {
            cfg.use_color = false;
        }
        Ok(cfg)
    }
}
