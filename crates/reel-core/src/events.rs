use serde::{Deserialize, Serialize};

use crate::errors::ErrorRecord;

/// Canonical events delivered to the host, in one total order per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdEvent {
    /// Response parsed and a creative selected; the host may call `init`.
    #[serde(rename = "session_ready")]
    SessionReady,
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "loaded")]
    Loaded,
    #[serde(rename = "size_changed")]
    SizeChanged,
    #[serde(rename = "duration_changed")]
    DurationChanged,
    #[serde(rename = "volume_changed")]
    VolumeChanged,
    #[serde(rename = "impression")]
    Impression,
    #[serde(rename = "click_through")]
    ClickThrough {
        url: Option<String>,
        id: Option<String>,
        /// True when the creative asks the player to open the url itself.
        player_handles: bool,
    },
    #[serde(rename = "video_start")]
    VideoStart,
    #[serde(rename = "first_quartile")]
    FirstQuartile,
    #[serde(rename = "midpoint")]
    Midpoint,
    #[serde(rename = "third_quartile")]
    ThirdQuartile,
    #[serde(rename = "video_complete")]
    VideoComplete,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "playing")]
    Playing,
    #[serde(rename = "error")]
    Error { error: ErrorRecord },
    #[serde(rename = "log")]
    Log { message: String },
    /// MUST follow the last per-ad `Stopped`/`Skipped` of the response.
    #[serde(rename = "all_completed")]
    AllCompleted,
}

/// Closed set of event names used to key host listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdEventKind {
    SessionReady,
    Started,
    Stopped,
    Skipped,
    Loaded,
    SizeChanged,
    DurationChanged,
    VolumeChanged,
    Impression,
    ClickThrough,
    VideoStart,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    VideoComplete,
    Paused,
    Playing,
    Error,
    Log,
    AllCompleted,
}

impl AdEvent {
    pub fn kind(&self) -> AdEventKind {
        match self {
            Self::SessionReady => AdEventKind::SessionReady,
            Self::Started => AdEventKind::Started,
            Self::Stopped => AdEventKind::Stopped,
            Self::Skipped => AdEventKind::Skipped,
            Self::Loaded => AdEventKind::Loaded,
            Self::SizeChanged => AdEventKind::SizeChanged,
            Self::DurationChanged => AdEventKind::DurationChanged,
            Self::VolumeChanged => AdEventKind::VolumeChanged,
            Self::Impression => AdEventKind::Impression,
            Self::ClickThrough { .. } => AdEventKind::ClickThrough,
            Self::VideoStart => AdEventKind::VideoStart,
            Self::FirstQuartile => AdEventKind::FirstQuartile,
            Self::Midpoint => AdEventKind::Midpoint,
            Self::ThirdQuartile => AdEventKind::ThirdQuartile,
            Self::VideoComplete => AdEventKind::VideoComplete,
            Self::Paused => AdEventKind::Paused,
            Self::Playing => AdEventKind::Playing,
            Self::Error { .. } => AdEventKind::Error,
            Self::Log { .. } => AdEventKind::Log,
            Self::AllCompleted => AdEventKind::AllCompleted,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl AdEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionReady => "session_ready",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Skipped => "skipped",
            Self::Loaded => "loaded",
            Self::SizeChanged => "size_changed",
            Self::DurationChanged => "duration_changed",
            Self::VolumeChanged => "volume_changed",
            Self::Impression => "impression",
            Self::ClickThrough => "click_through",
            Self::VideoStart => "video_start",
            Self::FirstQuartile => "first_quartile",
            Self::Midpoint => "midpoint",
            Self::ThirdQuartile => "third_quartile",
            Self::VideoComplete => "video_complete",
            Self::Paused => "paused",
            Self::Playing => "playing",
            Self::Error => "error",
            Self::Log => "log",
            Self::AllCompleted => "all_completed",
        }
    }
}

impl std::fmt::Display for AdEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
