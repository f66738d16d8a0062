use std::sync::Arc;

use reel_core::creative::{CreativeLoader, CreativeSignal};
use reel_core::errors::{ErrorKind, ErrorRecord};
use reel_core::events::{AdEvent, AdEventKind};
use reel_core::ids::{RequestId, SessionId};
use reel_core::media::{CapabilityProbe, MediaEvent, RenderTarget};
use reel_core::model::{Ad, AdResponse, Creative, MediaVariant, RenderSize};
use reel_core::parser::{AdSource, ParseError, RequestOptions, ResponseParser};
use reel_core::tracking::TrackerFactory;
use reel_settings::{PlaybackSettings, ReelSettings};
use reel_telemetry::MetricsRecorder;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{
    AdapterCx, AdapterEvent, CreativeAdapter, InitRequest, InteractiveCreativeAdapter, LoadState,
    NativeMediaAdapter,
};
use crate::emitter::EventEmitter;
use crate::error::SetupError;
use crate::metrics;
use crate::quartiles::{Checkpoint, QuartileTracker};
use crate::relay::TrackingRelay;
use crate::selector::{pick_for_size, select_variants};
use crate::sequencer::AdPod;
use crate::signal::{MediaEventSender, Signal, SignalReceiver, SignalSender};
use crate::timers::{TimeoutGuard, TimerKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    ResponseReceived,
    CreativeSelected,
    Loaded,
    Playing,
    Paused,
    Stopped,
    Skipped,
    Error,
    AdvancingPod,
    Completed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::ResponseReceived => "response_received",
            Self::CreativeSelected => "creative_selected",
            Self::Loaded => "loaded",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::AdvancingPod => "advancing_pod",
            Self::Completed => "completed",
        }
    }
}

/// Observable per-session facts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionAttributes {
    pub render_width: u32,
    pub render_height: u32,
    pub view_mode: String,
    pub volume: f64,
    pub duration: Option<f64>,
    pub remaining_time: Option<f64>,
    pub is_interactive: bool,
    pub has_impression: bool,
    pub has_started: bool,
    pub next_quartile_index: usize,
    pub is_ad_pod: bool,
    pub is_destroyed: bool,
}

impl Default for SessionAttributes {
    fn default() -> Self {
        let size = RenderSize::default();
        Self {
            render_width: size.width,
            render_height: size.height,
            view_mode: size.view_mode,
            volume: 1.0,
            duration: None,
            remaining_time: None,
            is_interactive: false,
            has_impression: false,
            has_started: false,
            next_quartile_index: 0,
            is_ad_pod: false,
            is_destroyed: false,
        }
    }
}

impl SessionAttributes {
    fn reset_ad(&mut self) {
        self.duration = None;
        self.remaining_time = None;
        self.is_interactive = false;
        self.has_impression = false;
        self.has_started = false;
        self.next_quartile_index = 0;
    }

    fn render_size(&self) -> RenderSize {
        RenderSize {
            width: self.render_width,
            height: self.render_height,
            view_mode: self.view_mode.clone(),
        }
    }
}

/// External services the controller consults.
pub struct Collaborators {
    pub parser: Arc<dyn ResponseParser>,
    pub probe: Arc<dyn CapabilityProbe>,
    pub trackers: Arc<dyn TrackerFactory>,
    pub loader: Box<dyn CreativeLoader>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Finish {
    Stopped,
    Skipped,
}

/// Drives one ad session over a bound render target.
///
/// All state changes happen on the caller's task: public operations run
/// synchronously, and everything asynchronous (parser results, timers,
/// creative and media callbacks) is queued as a [`Signal`] and applied by
/// [`step`](Self::step) or [`process_pending`](Self::process_pending).
pub struct AdsManager {
    session_id: SessionId,
    state: SessionState,
    attributes: SessionAttributes,
    target: Option<RenderTarget>,
    loader: Box<dyn CreativeLoader>,
    parser: Arc<dyn ResponseParser>,
    probe: Arc<dyn CapabilityProbe>,
    trackers: Arc<dyn TrackerFactory>,
    playback: PlaybackSettings,
    default_options: RequestOptions,
    options: RequestOptions,
    emitter: EventEmitter,
    timers: TimeoutGuard,
    tx: SignalSender,
    rx: SignalReceiver,
    pod: AdPod,
    current: Option<(Ad, Creative)>,
    variants: Vec<MediaVariant>,
    adapter: Option<Box<dyn CreativeAdapter>>,
    relay: TrackingRelay,
    quartiles: QuartileTracker,
    request: Option<RequestId>,
    request_task: Option<AbortHandle>,
    request_started: Option<Instant>,
    dirty: bool,
    destroyed: bool,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl AdsManager {
    pub fn new(
        target: RenderTarget,
        collaborators: Collaborators,
        settings: &ReelSettings,
    ) -> Result<Self, SetupError> {
        if !target.slot.is_attached() {
            return Err(SetupError::RenderTargetDetached);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let default_options = settings.request.to_request_options();
        let session_id = SessionId::new();
        info!(session_id = %session_id, "ads manager created");
        Ok(Self {
            session_id,
            state: SessionState::Idle,
            attributes: SessionAttributes::default(),
            target: Some(target),
            loader: collaborators.loader,
            parser: collaborators.parser,
            probe: collaborators.probe,
            trackers: collaborators.trackers,
            playback: settings.playback.clone(),
            options: default_options.clone(),
            default_options,
            emitter: EventEmitter::new(),
            timers: TimeoutGuard::new(tx.clone()),
            tx,
            rx,
            pod: AdPod::new(),
            current: None,
            variants: Vec::new(),
            adapter: None,
            relay: TrackingRelay::new(),
            quartiles: QuartileTracker::new(),
            request: None,
            request_task: None,
            request_started: None,
            dirty: false,
            destroyed: false,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // --- Accessors ---

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &SessionAttributes {
        &self.attributes
    }

    /// The ad and creative currently selected, if any.
    pub fn current_ad(&self) -> Option<(&Ad, &Creative)> {
        self.current.as_ref().map(|(ad, creative)| (ad, creative))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn get_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Sender the host uses to forward its media element callbacks.
    pub fn media_events(&self) -> MediaEventSender {
        MediaEventSender::new(self.tx.clone())
    }

    /// Every canonical event, in emission order.
    pub fn subscribe(&self) -> broadcast::Receiver<AdEvent> {
        self.emitter.subscribe()
    }

    /// Register the listener for `kind`, replacing any previous one.
    pub fn add_event_listener(
        &mut self,
        kind: AdEventKind,
        listener: impl FnMut(&AdEvent) + Send + 'static,
    ) -> bool {
        if self.destroyed {
            return false;
        }
        self.emitter.add(kind, Box::new(listener));
        true
    }

    pub fn remove_event_listener(&mut self, kind: AdEventKind) -> bool {
        self.emitter.remove(kind)
    }

    // --- Signal processing ---

    /// Wait for the next signal and apply it. False once destroyed.
    pub async fn step(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        match self.rx.recv().await {
            Some(signal) => {
                self.handle(signal);
                true
            }
            None => false,
        }
    }

    /// Apply every signal already queued. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while !self.destroyed {
            let Ok(signal) = self.rx.try_recv() else {
                break;
            };
            self.handle(signal);
            applied += 1;
        }
        applied
    }

    fn handle(&mut self, signal: Signal) {
        if self.destroyed {
            return;
        }
        match signal {
            Signal::Response { request, result } => self.on_response(request, result),
            Signal::Timer { kind, generation } => {
                if self.timers.fire(kind, generation) {
                    self.on_timer(kind);
                } else {
                    debug!(?kind, generation, "stale timer");
                }
            }
            Signal::Creative(signal) => self.on_creative_signal(signal),
            Signal::Media(event) => self.on_media_event(event),
        }
    }

    // --- Request & selection ---

    /// Start a new session for `source`, aborting any session in flight.
    #[instrument(skip(self, source, options), fields(session_id = %self.session_id))]
    pub fn request_ads(&mut self, source: Option<&str>, options: Option<RequestOptions>) {
        if self.destroyed {
            return;
        }
        self.abort();
        self.options = options.unwrap_or_else(|| self.default_options.clone());
        self.count(metrics::REQUESTS_TOTAL, &[]);

        let Some(source) = source.and_then(AdSource::classify) else {
            self.fail(ErrorRecord::new(ErrorKind::RequestInputInvalid));
            return;
        };

        self.dirty = true;
        self.set_state(SessionState::Requesting);
        let request = RequestId::new();
        info!(request_id = %request, url = matches!(source, AdSource::Url(_)), "requesting ads");

        let parser = self.parser.clone();
        let tx = self.tx.clone();
        let parser_options = self.options.parser_options();
        let tagged = request.clone();
        let task = tokio::spawn(async move {
            let result = parser.load(source, parser_options).await;
            let _ = tx.send(Signal::Response {
                request: tagged,
                result,
            });
        });

        self.request = Some(request);
        self.request_task = Some(task.abort_handle());
        self.request_started = Some(Instant::now());
        self.timers
            .arm(TimerKind::ResponseLoad, self.options.response_load_timeout());
    }

    fn on_response(&mut self, request: RequestId, result: Result<AdResponse, ParseError>) {
        if self.request.as_ref() != Some(&request) {
            debug!(request_id = %request, "dropping superseded response");
            return;
        }
        self.request = None;
        self.request_task = None;
        self.timers.cancel(TimerKind::ResponseLoad);
        if let (Some(started), Some(m)) = (self.request_started.take(), &self.metrics) {
            m.histogram_observe(
                metrics::REQUEST_DURATION_MS,
                &[],
                started.elapsed().as_secs_f64() * 1000.0,
            );
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.fail(e.to_record());
                return;
            }
        };
        if response.ads.is_empty() {
            self.fail(ErrorRecord::new(ErrorKind::EmptyResponse));
            return;
        }

        self.set_state(SessionState::ResponseReceived);
        info!(request_id = %request, ads = response.ads.len(), "response received");
        self.pod.load(response.ads);
        self.attributes.is_ad_pod = self.pod.is_ad_pod();
        self.select_next_ad();
    }

    fn select_next_ad(&mut self) {
        let Some(ad) = self.pod.take_next() else {
            self.abort();
            return;
        };
        if let Some(m) = &self.metrics {
            m.gauge_set(metrics::POD_REMAINING, &[], self.pod.remaining() as f64);
        }
        let Some(creative) = ad.first_linear().cloned() else {
            self.fail(ErrorRecord::new(ErrorKind::NonLinearUnsupported));
            return;
        };
        match select_variants(&creative, self.probe.as_ref()) {
            Ok(variants) => {
                debug!(
                    ad_id = ad.id.as_deref().unwrap_or("-"),
                    variants = variants.len(),
                    "creative selected"
                );
                self.relay.bind(self.trackers.create(&ad, &creative));
                self.variants = variants;
                self.current = Some((ad, creative));
                self.set_state(SessionState::CreativeSelected);
                self.emit(AdEvent::SessionReady);
            }
            Err(record) => self.fail(record),
        }
    }

    // --- Host operations ---

    /// Bring the selected creative up at the given render size.
    pub fn init(&mut self, width: u32, height: u32, view_mode: &str) {
        if self.destroyed {
            return;
        }
        if self.state != SessionState::CreativeSelected || self.adapter.is_some() {
            debug!(state = self.state.as_str(), "init ignored");
            return;
        }
        let Some(variant) = pick_for_size(&self.variants, height).cloned() else {
            return;
        };
        let ad_parameters = self
            .current
            .as_ref()
            .and_then(|(_, creative)| creative.ad_parameters.clone());

        self.attributes.render_width = width;
        self.attributes.render_height = height;
        self.attributes.view_mode = view_mode.to_string();
        self.attributes.is_interactive = variant.is_interactive_package();
        if let Some(target) = self.target.as_mut() {
            target.slot.resize(width, height);
        }

        let adapter: Box<dyn CreativeAdapter> = if self.attributes.is_interactive {
            Box::new(InteractiveCreativeAdapter::new(
                self.playback.min_interactive_version,
                self.playback.desired_bitrate,
            ))
        } else {
            Box::new(NativeMediaAdapter::new(self.playback.max_muted_retries))
        };
        self.adapter = Some(adapter);
        info!(
            session_id = %self.session_id,
            interactive = self.attributes.is_interactive,
            height = variant.height,
            "initializing creative"
        );

        let request = InitRequest {
            variant,
            size: self.attributes.render_size(),
            ad_parameters,
            autoplay: self.options.autoplay,
            muted: self.options.muted,
        };
        match self.with_adapter(|adapter, cx| adapter.initialize(cx, request)) {
            Some(Ok(LoadState::Ready)) => self.apply(vec![AdapterEvent::Loaded]),
            Some(Ok(LoadState::Pending)) => {
                self.timers
                    .arm(TimerKind::MediaLoad, self.options.media_load_timeout());
            }
            Some(Err(record)) => self.fail(record),
            None => {}
        }
    }

    /// Begin playback. Only a loaded creative can be started.
    pub fn start(&mut self) {
        if self.expect_state(SessionState::Loaded, "start") {
            self.drive(|adapter, cx| adapter.start(cx));
        }
    }

    pub fn pause(&mut self) {
        if self.expect_state(SessionState::Playing, "pause") {
            self.drive(|adapter, cx| adapter.pause(cx));
        }
    }

    pub fn resume(&mut self) {
        if self.expect_state(SessionState::Paused, "resume") {
            self.drive(|adapter, cx| adapter.resume(cx));
        }
    }

    pub fn stop(&mut self) {
        self.drive(|adapter, cx| adapter.stop(cx));
    }

    pub fn skip(&mut self) {
        self.drive(|adapter, cx| adapter.skip(cx));
    }

    pub fn collapse(&mut self) {
        self.drive(|adapter, cx| adapter.collapse(cx));
    }

    pub fn expand(&mut self) {
        self.drive(|adapter, cx| adapter.expand(cx));
    }

    pub fn resize(&mut self, width: u32, height: u32, view_mode: &str) {
        if self.destroyed || self.adapter.is_none() {
            return;
        }
        self.attributes.render_width = width;
        self.attributes.render_height = height;
        self.attributes.view_mode = view_mode.to_string();
        if let Some(target) = self.target.as_mut() {
            target.slot.resize(width, height);
        }
        let size = self.attributes.render_size();
        self.drive(|adapter, cx| adapter.resize(cx, &size));
    }

    /// No-op until a creative is initialized.
    pub fn set_volume(&mut self, volume: f64) {
        if self.destroyed || self.adapter.is_none() || !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.attributes.volume = volume;
        self.drive(|adapter, cx| adapter.set_volume(cx, volume));
    }

    /// `None` while no creative is active.
    pub fn get_volume(&mut self) -> Option<f64> {
        self.with_adapter(|adapter, cx| adapter.volume(cx)).flatten()
    }

    pub fn get_remaining_time(&mut self) -> Option<f64> {
        self.with_adapter(|adapter, cx| adapter.remaining_time(cx))
            .flatten()
            .or(self.attributes.remaining_time)
    }

    pub fn get_duration(&mut self) -> Option<f64> {
        self.attributes
            .duration
            .or_else(|| self.with_adapter(|adapter, cx| adapter.duration(cx)).flatten())
    }

    /// Slot click on the native path: fire click tracking and surface the
    /// click-through url for the host to open.
    pub fn click(&mut self) {
        if self.destroyed || self.adapter.is_none() || self.attributes.is_interactive {
            return;
        }
        if let Some(url) = self.relay.click() {
            self.emit(AdEvent::ClickThrough {
                url: Some(url),
                id: None,
                player_handles: true,
            });
        }
    }

    /// Tear the session down and return to `Idle`. Idempotent.
    pub fn abort(&mut self) {
        if self.destroyed {
            return;
        }
        if !self.dirty {
            self.state = SessionState::Idle;
            return;
        }
        self.timers.clear_all();
        self.request = None;
        self.request_started = None;
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
        self.teardown_adapter();
        self.pod.clear();
        self.current = None;
        self.variants.clear();
        self.relay.release();
        self.quartiles.reset();
        self.attributes.reset_ad();
        self.attributes.is_ad_pod = false;
        if let Some(target) = self.target.as_mut() {
            target.media.pause();
            target.media.set_source(None);
            target.slot.reset();
        }
        self.set_state(SessionState::Idle);
        self.dirty = false;
        info!(session_id = %self.session_id, "session aborted");
    }

    /// Abort, drop every listener and release the render target. Every later
    /// call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.abort();
        self.emitter.clear();
        if let Some(mut target) = self.target.take() {
            target.slot.detach();
        }
        self.destroyed = true;
        self.attributes.is_destroyed = true;
        info!(session_id = %self.session_id, "ads manager destroyed");
    }

    // --- Internals ---

    fn with_adapter<R>(
        &mut self,
        f: impl FnOnce(&mut dyn CreativeAdapter, &mut AdapterCx<'_>) -> R,
    ) -> Option<R> {
        let (Some(adapter), Some(target)) = (self.adapter.as_mut(), self.target.as_mut()) else {
            return None;
        };
        let mut cx = AdapterCx {
            target,
            loader: &mut *self.loader,
            signals: &self.tx,
        };
        Some(f(&mut **adapter, &mut cx))
    }

    fn drive(
        &mut self,
        f: impl FnOnce(&mut dyn CreativeAdapter, &mut AdapterCx<'_>) -> Vec<AdapterEvent>,
    ) {
        if self.destroyed {
            return;
        }
        if let Some(events) = self.with_adapter(f) {
            self.apply(events);
        }
    }

    /// Host playback calls are only honoured in one state each.
    fn expect_state(&self, expected: SessionState, op: &'static str) -> bool {
        if self.destroyed {
            return false;
        }
        if self.state != expected {
            debug!(op, state = self.state.as_str(), "ignored in this state");
            return false;
        }
        true
    }

    fn teardown_adapter(&mut self) {
        self.with_adapter(|adapter, cx| adapter.teardown(cx));
        self.adapter = None;
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::ResponseLoad => {
                if self.state == SessionState::Requesting {
                    self.fail(ErrorRecord::new(ErrorKind::ResponseLoadTimeout));
                }
            }
            TimerKind::MediaLoad => {
                let seconds = self.options.media_load_timeout_ms as f64 / 1000.0;
                self.fail(ErrorRecord::new(ErrorKind::MediaLoadTimeout).format_message(&[seconds]));
            }
            TimerKind::PodAdvance => {
                if self.state == SessionState::AdvancingPod {
                    self.select_next_ad();
                }
            }
            TimerKind::ProgressPoll => self.poll_tick(),
        }
    }

    fn on_creative_signal(&mut self, signal: CreativeSignal) {
        match self.with_adapter(|adapter, cx| adapter.on_creative_signal(cx, signal)) {
            Some(events) => self.apply(events),
            None => debug!("creative signal without an active creative"),
        }
    }

    fn on_media_event(&mut self, event: MediaEvent) {
        if let Some(events) = self.with_adapter(|adapter, cx| adapter.on_media_event(cx, event)) {
            self.apply(events);
        }
    }

    fn apply(&mut self, events: Vec<AdapterEvent>) {
        for event in events {
            if self.adapter.is_none() {
                debug!("creative gone, dropping remaining adapter events");
                break;
            }
            match event {
                AdapterEvent::Loaded => {
                    self.timers.cancel(TimerKind::MediaLoad);
                    if self.state == SessionState::CreativeSelected {
                        self.set_state(SessionState::Loaded);
                    }
                    self.emit(AdEvent::Loaded);
                }
                AdapterEvent::Started => {
                    self.attributes.has_started = true;
                    if let Some(target) = self.target.as_mut() {
                        target.slot.show();
                    }
                    self.set_state(SessionState::Playing);
                    self.emit(AdEvent::Started);
                }
                AdapterEvent::Stopped => self.finish_ad(Finish::Stopped),
                AdapterEvent::Skipped => {
                    self.relay.skip();
                    self.finish_ad(Finish::Skipped);
                }
                AdapterEvent::Ended => {
                    self.relay.complete();
                    self.finish_ad(Finish::Stopped);
                }
                AdapterEvent::SizeChanged => self.emit(AdEvent::SizeChanged),
                AdapterEvent::DurationChanged(duration) => {
                    if let Some(d) = duration.filter(|d| d.is_finite() && *d >= 0.0) {
                        self.attributes.duration = Some(d);
                        self.relay.duration(d);
                    }
                    self.emit(AdEvent::DurationChanged);
                }
                AdapterEvent::VolumeChanged => self.emit(AdEvent::VolumeChanged),
                AdapterEvent::MutedChanged(muted) => self.relay.muted(muted),
                AdapterEvent::ClickThrough {
                    url,
                    id,
                    player_handles,
                } => {
                    self.relay.click();
                    self.emit(AdEvent::ClickThrough {
                        url,
                        id,
                        player_handles,
                    });
                }
                AdapterEvent::Progress {
                    current_time,
                    duration,
                } => self.on_progress(current_time, duration),
                AdapterEvent::Checkpoint(checkpoint) => self.on_checkpoint(checkpoint),
                AdapterEvent::Paused => {
                    self.relay.paused(true);
                    self.set_state(SessionState::Paused);
                    self.emit(AdEvent::Paused);
                }
                AdapterEvent::Playing => {
                    self.relay.paused(false);
                    self.set_state(SessionState::Playing);
                    self.emit(AdEvent::Playing);
                }
                AdapterEvent::Failed(record) => self.fail(record),
                AdapterEvent::Log(message) => self.emit(AdEvent::Log { message }),
            }
        }
    }

    /// Native progress sample.
    fn on_progress(&mut self, current_time: f64, duration: f64) {
        let percent = current_time * 100.0 / duration;
        for checkpoint in self.quartiles.observe(percent) {
            self.fire_checkpoint(checkpoint);
            if self.adapter.is_none() {
                return;
            }
        }
        self.relay.progress(current_time);
        if duration > 0.0 {
            self.attributes.remaining_time = Some((duration - current_time).max(0.0));
        }
    }

    /// Checkpoint reported by an interactive creative.
    fn on_checkpoint(&mut self, checkpoint: Checkpoint) {
        if self.attributes.is_interactive && checkpoint != Checkpoint::Impression {
            self.refresh_interactive_progress();
        }
        for reached in self.quartiles.reach(checkpoint) {
            self.fire_checkpoint(reached);
        }
    }

    fn fire_checkpoint(&mut self, checkpoint: Checkpoint) {
        match checkpoint {
            Checkpoint::Impression if !self.attributes.has_impression => {
                self.attributes.has_impression = true;
                if self.attributes.is_interactive {
                    if let Some(d) = self.with_adapter(|a, cx| a.duration(cx)).flatten() {
                        self.attributes.duration = Some(d);
                        self.relay.duration(d);
                    }
                    self.timers
                        .start_poll(self.playback.progress_poll_interval());
                }
                self.relay.impression();
                self.count(metrics::IMPRESSIONS_TOTAL, &[]);
            }
            Checkpoint::Complete if self.attributes.is_interactive => self.relay.complete(),
            _ => {}
        }
        self.attributes.next_quartile_index = self.quartiles.next_index();
        self.emit(checkpoint.to_event());
    }

    /// Re-read the creative's remaining time. Returns `(current, duration)`
    /// when both are known.
    fn refresh_interactive_progress(&mut self) -> Option<(f64, f64)> {
        let remaining = self
            .with_adapter(|adapter, cx| adapter.remaining_time(cx))
            .flatten()
            .filter(|r| r.is_finite() && *r >= 0.0)?;
        self.attributes.remaining_time = Some(remaining);
        let duration = self.attributes.duration?;
        let current = (duration - remaining).max(0.0);
        self.relay.progress(current);
        Some((current, duration))
    }

    fn poll_tick(&mut self) {
        let live =
            self.attributes.is_interactive && self.adapter.is_some() && self.relay.is_active();
        if !live {
            debug!("stopping progress poll");
            self.timers.cancel(TimerKind::ProgressPoll);
            return;
        }
        if let Some((current, duration)) = self.refresh_interactive_progress() {
            if duration > 0.0 {
                for checkpoint in self.quartiles.observe(current * 100.0 / duration) {
                    self.fire_checkpoint(checkpoint);
                }
            }
        }
    }

    fn finish_ad(&mut self, finish: Finish) {
        if finish == Finish::Stopped && !self.attributes.has_started {
            self.fail(
                ErrorRecord::new(ErrorKind::InteractiveCreativeError)
                    .caused_by("creative stopped before it started"),
            );
            return;
        }
        match finish {
            Finish::Stopped => {
                self.set_state(SessionState::Stopped);
                self.emit(AdEvent::Stopped);
            }
            Finish::Skipped => {
                self.set_state(SessionState::Skipped);
                self.emit(AdEvent::Skipped);
            }
        }
        self.count(metrics::ADS_COMPLETED_TOTAL, &[]);

        if self.pod.is_exhausted() {
            self.abort();
            self.set_state(SessionState::Completed);
            self.emit(AdEvent::AllCompleted);
            self.set_state(SessionState::Idle);
            return;
        }

        self.set_state(SessionState::AdvancingPod);
        self.timers.cancel(TimerKind::MediaLoad);
        self.timers.cancel(TimerKind::ProgressPoll);
        self.teardown_adapter();
        if let Some(target) = self.target.as_mut() {
            target.media.pause();
            target.media.set_source(None);
        }
        self.relay.release();
        self.quartiles.reset();
        self.attributes.reset_ad();
        self.current = None;
        self.variants.clear();
        self.count(metrics::POD_ADVANCES_TOTAL, &[]);
        info!(remaining = self.pod.remaining(), "advancing pod");

        let delay = self.playback.pod_advance_delay();
        if delay.is_zero() {
            self.select_next_ad();
        } else {
            self.timers.arm(TimerKind::PodAdvance, delay);
        }
    }

    /// Abort, surface `record`, and settle back in `Idle`.
    fn fail(&mut self, record: ErrorRecord) {
        warn!(
            session_id = %self.session_id,
            code = record.code(),
            kind = record.kind().as_str(),
            cause = record.inner_cause().unwrap_or(""),
            "ad error: {}",
            record.message()
        );
        self.count(metrics::ERRORS_TOTAL, &[("kind", record.kind().as_str())]);
        self.relay.error(record.code());
        self.abort();
        self.set_state(SessionState::Error);
        self.emit(AdEvent::Error { error: record });
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "state");
            self.state = next;
        }
    }

    fn emit(&mut self, event: AdEvent) {
        self.emitter.emit(event);
    }

    fn count(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(m) = &self.metrics {
            m.counter_inc(name, labels, 1);
        }
    }
}

impl Drop for AdsManager {
    fn drop(&mut self) {
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
    }
}
