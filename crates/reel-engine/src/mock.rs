//! In-memory collaborators for tests and the `reel simulate` command.
//!
//! Every double shares its state behind an `Arc`, so a clone handed to the
//! controller can still be inspected from the outside.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reel_core::creative::{
    CreativeEvent, CreativeEventKind, CreativeFault, CreativeLoader, CreativeObject, CreativeSink,
};
use reel_core::ids::LoadToken;
use reel_core::media::{AdSlot, MediaElement, PlayRejected, SlotHandles};
use reel_core::model::{Ad, AdResponse, Creative};
use reel_core::parser::{AdSource, ParseError, ParserOptions, ResponseParser};
use reel_core::tracking::{Tracker, TrackerFactory};
use serde_json::{json, Value};

// --- Media element ---

#[derive(Clone, Debug, PartialEq)]
pub struct MediaState {
    pub source: Option<String>,
    pub loads: u32,
    /// Every `play()` attempt, rejected or not.
    pub plays: u32,
    pub pauses: u32,
    pub paused: bool,
    pub volume: f64,
    pub muted: bool,
    pending_rejections: u32,
    require_muted: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            source: None,
            loads: 0,
            plays: 0,
            pauses: 0,
            paused: true,
            volume: 1.0,
            muted: false,
            pending_rejections: 0,
            require_muted: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeMediaElement {
    state: Arc<Mutex<MediaState>>,
}

impl FakeMediaElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` calls to `play()`.
    pub fn reject_next_plays(&self, n: u32) {
        self.state.lock().pending_rejections = n;
    }

    /// Reject unmuted playback, like a browser autoplay policy.
    pub fn require_muted_autoplay(&self) {
        self.state.lock().require_muted = true;
    }

    pub fn snapshot(&self) -> MediaState {
        self.state.lock().clone()
    }
}

impl MediaElement for FakeMediaElement {
    fn set_source(&mut self, url: Option<&str>) {
        self.state.lock().source = url.map(str::to_string);
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn load(&mut self) {
        self.state.lock().loads += 1;
    }

    fn play(&mut self) -> Result<(), PlayRejected> {
        let mut s = self.state.lock();
        s.plays += 1;
        if s.pending_rejections > 0 {
            s.pending_rejections -= 1;
            return Err(PlayRejected {
                reason: "NotAllowedError".into(),
            });
        }
        if s.require_muted && !s.muted {
            return Err(PlayRejected {
                reason: "NotAllowedError: unmuted autoplay".into(),
            });
        }
        s.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut s = self.state.lock();
        s.pauses += 1;
        s.paused = true;
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.lock().volume = volume;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }
}

// --- Slot ---

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotState {
    pub attached: bool,
    pub visible: bool,
    pub width: u32,
    pub height: u32,
    pub resets: u32,
    pub detached: bool,
}

#[derive(Clone)]
pub struct FakeSlot {
    state: Arc<Mutex<SlotState>>,
}

impl Default for FakeSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSlot {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState {
                attached: true,
                ..Default::default()
            })),
        }
    }

    /// A slot that was never mounted in a host container.
    pub fn unattached() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    pub fn snapshot(&self) -> SlotState {
        self.state.lock().clone()
    }
}

impl AdSlot for FakeSlot {
    fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    fn show(&mut self) {
        self.state.lock().visible = true;
    }

    fn resize(&mut self, width: u32, height: u32) {
        let mut s = self.state.lock();
        s.width = width;
        s.height = height;
    }

    fn reset(&mut self) {
        let mut s = self.state.lock();
        s.resets += 1;
        s.visible = false;
    }

    fn detach(&mut self) {
        let mut s = self.state.lock();
        s.attached = false;
        s.detached = true;
        s.visible = false;
    }

    fn environment(&self) -> SlotHandles {
        SlotHandles {
            slot: Some("fake-slot".into()),
            video_slot: Some("fake-video".into()),
        }
    }
}

// --- Parser ---

#[derive(Clone, Debug)]
enum ParserMode {
    Respond(AdResponse),
    Fail(ParseError),
    Hang,
}

/// Parser that answers every request the same way.
#[derive(Clone)]
pub struct StaticParser {
    mode: ParserMode,
    delay: Duration,
    calls: Arc<Mutex<Vec<(AdSource, ParserOptions)>>>,
}

impl StaticParser {
    fn with_mode(mode: ParserMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    pub fn respond(response: AdResponse) -> Self {
        Self::with_mode(ParserMode::Respond(response))
    }

    pub fn fail(error: ParseError) -> Self {
        Self::with_mode(ParserMode::Fail(error))
    }

    /// Never resolves.
    pub fn hang() -> Self {
        Self::with_mode(ParserMode::Hang)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(AdSource, ParserOptions)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ResponseParser for StaticParser {
    async fn load(&self, source: AdSource, options: ParserOptions) -> Result<AdResponse, ParseError> {
        self.calls.lock().push((source, options));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.mode {
            ParserMode::Respond(response) => Ok(response.clone()),
            ParserMode::Fail(error) => Err(error.clone()),
            ParserMode::Hang => std::future::pending().await,
        }
    }
}

// --- Tracker ---

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerCall {
    /// A tracker was created for the ad with this id.
    Created(Option<String>),
    Impression,
    Progress(f64),
    Duration(f64),
    Paused(bool),
    Muted(bool),
    Complete,
    Skip,
    Click,
    Error(u32),
}

/// Factory whose trackers append to one shared call log.
#[derive(Clone, Default)]
pub struct RecordingTrackers {
    calls: Arc<Mutex<Vec<TrackerCall>>>,
    click_url: Option<String>,
}

impl RecordingTrackers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_click_url(mut self, url: impl Into<String>) -> Self {
        self.click_url = Some(url.into());
        self
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &TrackerCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }
}

impl TrackerFactory for RecordingTrackers {
    fn create(&self, ad: &Ad, _creative: &Creative) -> Box<dyn Tracker> {
        self.calls.lock().push(TrackerCall::Created(ad.id.clone()));
        Box::new(RecordingTracker {
            calls: self.calls.clone(),
            click_url: self.click_url.clone(),
        })
    }
}

struct RecordingTracker {
    calls: Arc<Mutex<Vec<TrackerCall>>>,
    click_url: Option<String>,
}

impl RecordingTracker {
    fn log(&self, call: TrackerCall) {
        self.calls.lock().push(call);
    }
}

impl Tracker for RecordingTracker {
    fn track_impression(&mut self) {
        self.log(TrackerCall::Impression);
    }

    fn set_progress(&mut self, current_time: f64) {
        self.log(TrackerCall::Progress(current_time));
    }

    fn set_duration(&mut self, duration: f64) {
        self.log(TrackerCall::Duration(duration));
    }

    fn set_paused(&mut self, paused: bool) {
        self.log(TrackerCall::Paused(paused));
    }

    fn set_muted(&mut self, muted: bool) {
        self.log(TrackerCall::Muted(muted));
    }

    fn complete(&mut self) {
        self.log(TrackerCall::Complete);
    }

    fn skip(&mut self) {
        self.log(TrackerCall::Skip);
    }

    fn click(&mut self) -> Option<String> {
        self.log(TrackerCall::Click);
        self.click_url.clone()
    }

    fn error_with_code(&mut self, code: u32) {
        self.log(TrackerCall::Error(code));
    }
}

// --- Interactive creative ---

const SCRIPTED_METHODS: [&str; 17] = [
    "handshakeVersion",
    "initAd",
    "startAd",
    "stopAd",
    "skipAd",
    "pauseAd",
    "resumeAd",
    "resizeAd",
    "collapseAd",
    "expandAd",
    "setAdVolume",
    "getAdVolume",
    "getAdRemainingTime",
    "getAdDuration",
    "getAdLinear",
    "subscribe",
    "unsubscribe",
];

struct Script {
    missing: HashSet<String>,
    faults: HashMap<String, String>,
    version: Option<String>,
    duration: f64,
    remaining: f64,
    volume: f64,
    auto_events: bool,
    sinks: HashMap<CreativeEventKind, CreativeSink>,
    calls: Vec<String>,
    init_args: Option<Vec<Value>>,
}

impl Script {
    fn has(&self, name: &str) -> bool {
        SCRIPTED_METHODS.contains(&name) && !self.missing.contains(name)
    }
}

/// Creative object that answers calls from a script and, by default, reacts
/// to lifecycle calls the way a well-behaved creative does (`initAd` →
/// `AdLoaded`, `startAd` → `AdStarted`, `stopAd` → `AdStopped`, ...).
#[derive(Clone)]
pub struct ScriptedCreative {
    state: Arc<Mutex<Script>>,
}

impl ScriptedCreative {
    /// A complete VPAID 2.0 creative.
    pub fn vpaid2() -> Self {
        Self {
            state: Arc::new(Mutex::new(Script {
                missing: HashSet::new(),
                faults: HashMap::new(),
                version: Some("2.0".into()),
                duration: 15.0,
                remaining: 15.0,
                volume: 1.0,
                auto_events: true,
                sinks: HashMap::new(),
                calls: Vec::new(),
                init_args: None,
            })),
        }
    }

    pub fn without(self, method: &str) -> Self {
        self.remove_method(method);
        self
    }

    /// Drop `method` from a creative that may already be loaded.
    pub fn remove_method(&self, method: &str) {
        self.state.lock().missing.insert(method.to_string());
    }

    pub fn failing(self, method: &str, message: &str) -> Self {
        self.state
            .lock()
            .faults
            .insert(method.to_string(), message.to_string());
        self
    }

    pub fn with_version(self, version: Option<&str>) -> Self {
        self.state.lock().version = version.map(str::to_string);
        self
    }

    pub fn with_timing(self, duration: f64, remaining: f64) -> Self {
        {
            let mut s = self.state.lock();
            s.duration = duration;
            s.remaining = remaining;
        }
        self
    }

    /// Stop reacting to lifecycle calls; events only flow through [`emit`](Self::emit).
    pub fn quiet(self) -> Self {
        self.state.lock().auto_events = false;
        self
    }

    pub fn set_remaining(&self, remaining: f64) {
        self.state.lock().remaining = remaining;
    }

    /// Deliver `event` to its subscriber. False if nobody is subscribed.
    pub fn emit(&self, event: CreativeEvent) -> bool {
        let sink = self.state.lock().sinks.get(&event.kind()).cloned();
        match sink {
            Some(sink) => {
                sink.emit(event);
                true
            }
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn init_args(&self) -> Option<Vec<Value>> {
        self.state.lock().init_args.clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().sinks.len()
    }
}

impl CreativeObject for ScriptedCreative {
    fn has_method(&self, name: &str) -> bool {
        self.state.lock().has(name)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, CreativeFault> {
        let (result, follow_up) = {
            let mut s = self.state.lock();
            s.calls.push(name.to_string());
            if !s.has(name) {
                return Err(CreativeFault::MissingMethod(name.to_string()));
            }
            if let Some(message) = s.faults.get(name) {
                return Err(CreativeFault::Thrown(message.clone()));
            }
            let (result, follow_up) = match name {
                "handshakeVersion" => (
                    s.version.clone().map_or(Value::Null, Value::String),
                    None,
                ),
                "initAd" => {
                    s.init_args = Some(args.to_vec());
                    (Value::Null, Some(CreativeEvent::AdLoaded))
                }
                "startAd" => (Value::Null, Some(CreativeEvent::AdStarted)),
                "stopAd" => (Value::Null, Some(CreativeEvent::AdStopped)),
                "skipAd" => (Value::Null, Some(CreativeEvent::AdSkipped)),
                "pauseAd" => (Value::Null, Some(CreativeEvent::AdPaused)),
                "resumeAd" => (Value::Null, Some(CreativeEvent::AdPlaying)),
                "resizeAd" => (Value::Null, Some(CreativeEvent::AdSizeChange)),
                "setAdVolume" => {
                    if let Some(v) = args.first().and_then(Value::as_f64) {
                        s.volume = v;
                    }
                    (Value::Null, Some(CreativeEvent::AdVolumeChange))
                }
                "getAdVolume" => (json!(s.volume), None),
                "getAdRemainingTime" => (json!(s.remaining), None),
                "getAdDuration" => (json!(s.duration), None),
                "getAdLinear" => (json!(true), None),
                _ => (Value::Null, None),
            };
            (result, follow_up.filter(|_| s.auto_events))
        };
        if let Some(event) = follow_up {
            self.emit(event);
        }
        Ok(result)
    }

    fn subscribe(&mut self, kind: CreativeEventKind, sink: CreativeSink) {
        self.state.lock().sinks.insert(kind, sink);
    }

    fn unsubscribe(&mut self, kind: CreativeEventKind) {
        self.state.lock().sinks.remove(&kind);
    }
}

// --- Loader ---

#[derive(Clone)]
enum LoaderBehaviour {
    Deliver(ScriptedCreative),
    DeliverNone,
    Fail(String),
    /// Keep the sink; the test answers through [`FakeCreativeLoader::last_sink`].
    Manual,
}

#[derive(Default)]
struct LoaderState {
    opened: Vec<(String, LoadToken)>,
    closed: Vec<LoadToken>,
    sinks: Vec<CreativeSink>,
}

#[derive(Clone)]
pub struct FakeCreativeLoader {
    behaviour: LoaderBehaviour,
    state: Arc<Mutex<LoaderState>>,
}

impl FakeCreativeLoader {
    fn with_behaviour(behaviour: LoaderBehaviour) -> Self {
        Self {
            behaviour,
            state: Arc::default(),
        }
    }

    /// Answers every open with (a clone of) `creative`.
    pub fn delivering(creative: ScriptedCreative) -> Self {
        Self::with_behaviour(LoaderBehaviour::Deliver(creative))
    }

    /// The context loads but exposes no entry object.
    pub fn delivering_none() -> Self {
        Self::with_behaviour(LoaderBehaviour::DeliverNone)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behaviour(LoaderBehaviour::Fail(message.into()))
    }

    pub fn manual() -> Self {
        Self::with_behaviour(LoaderBehaviour::Manual)
    }

    pub fn opened(&self) -> Vec<(String, LoadToken)> {
        self.state.lock().opened.clone()
    }

    pub fn closed(&self) -> Vec<LoadToken> {
        self.state.lock().closed.clone()
    }

    pub fn last_sink(&self) -> Option<CreativeSink> {
        self.state.lock().sinks.last().cloned()
    }
}

impl CreativeLoader for FakeCreativeLoader {
    fn open(&mut self, source_url: &str, sink: CreativeSink) {
        {
            let mut s = self.state.lock();
            s.opened.push((source_url.to_string(), sink.token().clone()));
            s.sinks.push(sink.clone());
        }
        match &self.behaviour {
            LoaderBehaviour::Deliver(creative) => sink.loaded(Some(Box::new(creative.clone()))),
            LoaderBehaviour::DeliverNone => sink.loaded(None),
            LoaderBehaviour::Fail(message) => sink.failed(message.clone()),
            LoaderBehaviour::Manual => {}
        }
    }

    fn close(&mut self, token: &LoadToken) {
        self.state.lock().closed.push(token.clone());
    }
}
