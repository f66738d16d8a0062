//! Settings type definitions.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only
//! needs the keys it overrides.

mod logging;
mod playback;
mod request;

pub use logging::LoggingSettings;
pub(crate) use logging::is_level as logging_level_ok;
pub use playback::PlaybackSettings;
pub use request::RequestDefaults;

use serde::{Deserialize, Serialize};

/// Root settings object, as stored in `~/.reel/settings.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReelSettings {
    pub request: RequestDefaults,
    pub playback: PlaybackSettings,
    pub logging: LoggingSettings,
}

impl ReelSettings {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        self.playback.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ReelSettings::default()).unwrap();
        assert_eq!(json["request"]["responseLoadTimeoutMs"], 23_000);
        assert_eq!(json["playback"]["podAdvanceDelayMs"], 75);
        assert_eq!(json["logging"]["level"], "info");
    }

    #[test]
    fn defaults_validate() {
        assert!(ReelSettings::default().validate().is_ok());
    }
}
