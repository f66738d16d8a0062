use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` still wins when set.
    pub level: String,
    /// Module path => level, e.g. `{"reel_engine": "debug"}`.
    pub module_levels: BTreeMap<String, String>,
    pub json: bool,
    /// Warn+ records kept in memory for diagnostics.
    pub recent_log_capacity: usize,
    pub metrics_enabled: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: BTreeMap::new(),
            json: true,
            recent_log_capacity: 256,
            metrics_enabled: true,
        }
    }
}

impl LoggingSettings {
    pub(crate) fn validate(&self) -> crate::Result<()> {
        let bad = std::iter::once(("logging.level".to_string(), &self.level))
            .chain(
                self.module_levels
                    .iter()
                    .map(|(m, l)| (format!("logging.moduleLevels.{m}"), l)),
            )
            .find(|(_, level)| !is_level(level));
        match bad {
            Some((key, level)) => Err(SettingsError::invalid(
                key,
                format!("has unknown log level {level:?}"),
            )),
            None => Ok(()),
        }
    }
}

pub(crate) fn is_level(s: &str) -> bool {
    LEVELS.contains(&s.to_lowercase().as_str())
}
