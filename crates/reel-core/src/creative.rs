use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::LoadToken;
use crate::media::SlotHandles;

/// Methods an interactive creative must expose before the handshake proceeds.
pub const REQUIRED_METHODS: [&str; 7] = [
    "handshakeVersion",
    "initAd",
    "startAd",
    "stopAd",
    "subscribe",
    "unsubscribe",
    "getAdLinear",
];

/// Failure raised by a call into a creative object.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CreativeFault {
    #[error("method not available: {0}")]
    MissingMethod(String),
    #[error("creative threw: {0}")]
    Thrown(String),
}

/// Events a creative reports on its own event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreativeEventKind {
    AdStarted,
    AdStopped,
    AdSkipped,
    AdLoaded,
    AdSizeChange,
    AdDurationChange,
    AdVolumeChange,
    AdImpression,
    AdClickThru,
    AdVideoStart,
    AdVideoFirstQuartile,
    AdVideoMidpoint,
    AdVideoThirdQuartile,
    AdVideoComplete,
    AdPaused,
    AdPlaying,
    AdError,
    AdLog,
}

impl CreativeEventKind {
    pub const ALL: [CreativeEventKind; 18] = [
        Self::AdStarted,
        Self::AdStopped,
        Self::AdSkipped,
        Self::AdLoaded,
        Self::AdSizeChange,
        Self::AdDurationChange,
        Self::AdVolumeChange,
        Self::AdImpression,
        Self::AdClickThru,
        Self::AdVideoStart,
        Self::AdVideoFirstQuartile,
        Self::AdVideoMidpoint,
        Self::AdVideoThirdQuartile,
        Self::AdVideoComplete,
        Self::AdPaused,
        Self::AdPlaying,
        Self::AdError,
        Self::AdLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdStarted => "AdStarted",
            Self::AdStopped => "AdStopped",
            Self::AdSkipped => "AdSkipped",
            Self::AdLoaded => "AdLoaded",
            Self::AdSizeChange => "AdSizeChange",
            Self::AdDurationChange => "AdDurationChange",
            Self::AdVolumeChange => "AdVolumeChange",
            Self::AdImpression => "AdImpression",
            Self::AdClickThru => "AdClickThru",
            Self::AdVideoStart => "AdVideoStart",
            Self::AdVideoFirstQuartile => "AdVideoFirstQuartile",
            Self::AdVideoMidpoint => "AdVideoMidpoint",
            Self::AdVideoThirdQuartile => "AdVideoThirdQuartile",
            Self::AdVideoComplete => "AdVideoComplete",
            Self::AdPaused => "AdPaused",
            Self::AdPlaying => "AdPlaying",
            Self::AdError => "AdError",
            Self::AdLog => "AdLog",
        }
    }
}

impl fmt::Display for CreativeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CreativeEvent {
    AdStarted,
    AdStopped,
    AdSkipped,
    AdLoaded,
    AdSizeChange,
    AdDurationChange,
    AdVolumeChange,
    AdImpression,
    AdClickThru {
        url: Option<String>,
        id: Option<String>,
        player_handles: bool,
    },
    AdVideoStart,
    AdVideoFirstQuartile,
    AdVideoMidpoint,
    AdVideoThirdQuartile,
    AdVideoComplete,
    AdPaused,
    AdPlaying,
    AdError { message: String },
    AdLog { message: String },
}

impl CreativeEvent {
    pub fn kind(&self) -> CreativeEventKind {
        match self {
            Self::AdStarted => CreativeEventKind::AdStarted,
            Self::AdStopped => CreativeEventKind::AdStopped,
            Self::AdSkipped => CreativeEventKind::AdSkipped,
            Self::AdLoaded => CreativeEventKind::AdLoaded,
            Self::AdSizeChange => CreativeEventKind::AdSizeChange,
            Self::AdDurationChange => CreativeEventKind::AdDurationChange,
            Self::AdVolumeChange => CreativeEventKind::AdVolumeChange,
            Self::AdImpression => CreativeEventKind::AdImpression,
            Self::AdClickThru { .. } => CreativeEventKind::AdClickThru,
            Self::AdVideoStart => CreativeEventKind::AdVideoStart,
            Self::AdVideoFirstQuartile => CreativeEventKind::AdVideoFirstQuartile,
            Self::AdVideoMidpoint => CreativeEventKind::AdVideoMidpoint,
            Self::AdVideoThirdQuartile => CreativeEventKind::AdVideoThirdQuartile,
            Self::AdVideoComplete => CreativeEventKind::AdVideoComplete,
            Self::AdPaused => CreativeEventKind::AdPaused,
            Self::AdPlaying => CreativeEventKind::AdPlaying,
            Self::AdError { .. } => CreativeEventKind::AdError,
            Self::AdLog { .. } => CreativeEventKind::AdLog,
        }
    }
}

/// What a creative loader or a subscribed creative reports back.
/// Every signal carries the token of the load attempt it belongs to.
pub enum CreativeSignal {
    Loaded {
        token: LoadToken,
        object: Option<Box<dyn CreativeObject>>,
    },
    LoadFailed {
        token: LoadToken,
        message: String,
    },
    Event {
        token: LoadToken,
        event: CreativeEvent,
    },
}

impl CreativeSignal {
    pub fn token(&self) -> &LoadToken {
        match self {
            Self::Loaded { token, .. } | Self::LoadFailed { token, .. } | Self::Event { token, .. } => {
                token
            }
        }
    }
}

impl fmt::Debug for CreativeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { token, object } => f
                .debug_struct("Loaded")
                .field("token", token)
                .field("object", &object.is_some())
                .finish(),
            Self::LoadFailed { token, message } => f
                .debug_struct("LoadFailed")
                .field("token", token)
                .field("message", message)
                .finish(),
            Self::Event { token, event } => f
                .debug_struct("Event")
                .field("token", token)
                .field("event", event)
                .finish(),
        }
    }
}

type Deliver = Arc<dyn Fn(CreativeSignal) + Send + Sync>;

/// Return channel bound to one load attempt.
#[derive(Clone)]
pub struct CreativeSink {
    token: LoadToken,
    deliver: Deliver,
}

impl CreativeSink {
    pub fn new(token: LoadToken, deliver: impl Fn(CreativeSignal) + Send + Sync + 'static) -> Self {
        Self {
            token,
            deliver: Arc::new(deliver),
        }
    }

    pub fn token(&self) -> &LoadToken {
        &self.token
    }

    /// Context finished loading. `None` means the entry object was not exposed.
    pub fn loaded(&self, object: Option<Box<dyn CreativeObject>>) {
        (self.deliver)(CreativeSignal::Loaded {
            token: self.token.clone(),
            object,
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        (self.deliver)(CreativeSignal::LoadFailed {
            token: self.token.clone(),
            message: message.into(),
        });
    }

    pub fn emit(&self, event: CreativeEvent) {
        (self.deliver)(CreativeSignal::Event {
            token: self.token.clone(),
            event,
        });
    }
}

impl fmt::Debug for CreativeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreativeSink").field("token", &self.token).finish()
    }
}

/// Entry object of a loaded interactive creative.
///
/// Dispatch is by method name; callers check `has_method` first.
pub trait CreativeObject: Send {
    fn has_method(&self, name: &str) -> bool;
    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, CreativeFault>;
    fn subscribe(&mut self, kind: CreativeEventKind, sink: CreativeSink);
    fn unsubscribe(&mut self, kind: CreativeEventKind);
}

/// Opens isolated execution contexts for creative code.
pub trait CreativeLoader: Send {
    /// Begin loading `source_url`. The outcome arrives later through `sink`.
    fn open(&mut self, source_url: &str, sink: CreativeSink);
    /// Remove the context created for `token`, if any.
    fn close(&mut self, token: &LoadToken);
}

/// Passed as the last `initAd` argument.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDescriptor {
    pub slot: Option<String>,
    pub video_slot: Option<String>,
    pub video_slot_can_auto_play: bool,
}

impl EnvironmentDescriptor {
    pub fn new(handles: SlotHandles, can_autoplay: bool) -> Self {
        Self {
            slot: handles.slot,
            video_slot: handles.video_slot,
            video_slot_can_auto_play: can_autoplay,
        }
    }
}
