use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Knobs for creative playback and pod sequencing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    /// Bitrate hint (kbps) passed to interactive creatives in `initAd`.
    pub desired_bitrate: u32,
    /// Lowest interactive creative major version accepted by the handshake.
    pub min_interactive_version: u32,
    /// Muted play retries after an autoplay rejection.
    pub max_muted_retries: u32,
    /// Period of the interactive remaining-time poll.
    pub progress_poll_interval_ms: u64,
    /// Grace delay between one pod ad stopping and the next becoming ready.
    /// Zero advances immediately.
    pub pod_advance_delay_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            desired_bitrate: 268,
            min_interactive_version: 2,
            max_muted_retries: 3,
            progress_poll_interval_ms: 1000,
            pod_advance_delay_ms: 75,
        }
    }
}

impl PlaybackSettings {
    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    pub fn pod_advance_delay(&self) -> Duration {
        Duration::from_millis(self.pod_advance_delay_ms)
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.progress_poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "playback.progressPollIntervalMs",
                "must be positive",
            ));
        }
        if self.min_interactive_version == 0 {
            return Err(SettingsError::invalid(
                "playback.minInteractiveVersion",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
