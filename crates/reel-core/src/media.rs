use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Reports which media encodings the host can decode.
pub trait CapabilityProbe: Send + Sync {
    fn can_play(&self, mime_type: &str) -> bool;
}

/// Probe backed by a fixed list of mime types.
#[derive(Clone, Debug, Default)]
pub struct StaticCapabilities {
    playable: HashSet<String>,
}

impl StaticCapabilities {
    pub fn new<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            playable: mime_types.into_iter().map(Into::into).collect(),
        }
    }

    /// The four container types a typical HTML5 video element handles.
    pub fn html5() -> Self {
        Self::new(["video/mp4", "video/webm", "video/ogg", "video/3gpp"])
    }
}

impl CapabilityProbe for StaticCapabilities {
    fn can_play(&self, mime_type: &str) -> bool {
        self.playable.contains(mime_type)
    }
}

/// Playback request refused by the platform (e.g. unmuted autoplay policy).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("play rejected: {reason}")]
pub struct PlayRejected {
    pub reason: String,
}

/// The passive media element the native path drives.
pub trait MediaElement: Send {
    /// `None` blanks the element.
    fn set_source(&mut self, url: Option<&str>);
    fn source(&self) -> Option<String>;
    fn load(&mut self);
    fn play(&mut self) -> Result<(), PlayRejected>;
    fn pause(&mut self);
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn is_muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
}

/// The container the ad renders into.
pub trait AdSlot: Send {
    /// Whether the slot is mounted in a host container.
    fn is_attached(&self) -> bool;
    fn show(&mut self);
    fn resize(&mut self, width: u32, height: u32);
    /// Remove the slot and mount a fresh, hidden one.
    fn reset(&mut self);
    /// Remove the slot for good.
    fn detach(&mut self);
    /// Handles handed to interactive creatives so they can render.
    fn environment(&self) -> SlotHandles {
        SlotHandles::default()
    }
}

/// Opaque identifiers for the slot and media element, as seen by a creative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotHandles {
    pub slot: Option<String>,
    pub video_slot: Option<String>,
}

/// Slot plus media element, bound to the controller at construction.
pub struct RenderTarget {
    pub slot: Box<dyn AdSlot>,
    pub media: Box<dyn MediaElement>,
}

impl RenderTarget {
    pub fn new(slot: Box<dyn AdSlot>, media: Box<dyn MediaElement>) -> Self {
        Self { slot, media }
    }
}

/// Observations the host forwards from its media element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaEvent {
    TimeUpdate { current_time: f64, duration: f64 },
    MetadataLoaded { duration: f64 },
    Ended,
    VolumeChange { muted: bool, volume: f64 },
    /// Asynchronous rejection of a `play()` call.
    PlayRejected { reason: String },
    Error { message: String },
}
