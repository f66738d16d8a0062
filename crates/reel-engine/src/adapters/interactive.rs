use reel_core::creative::{
    CreativeEvent, CreativeEventKind, CreativeObject, CreativeSignal, CreativeSink,
    EnvironmentDescriptor, REQUIRED_METHODS,
};
use reel_core::errors::{ErrorKind, ErrorRecord};
use reel_core::ids::LoadToken;
use reel_core::model::RenderSize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{AdapterCx, AdapterEvent, CreativeAdapter, InitRequest, LoadState};
use crate::quartiles::Checkpoint;
use crate::signal::Signal;

fn creative_error(message: impl Into<String>) -> AdapterEvent {
    AdapterEvent::Failed(ErrorRecord::with_message(
        ErrorKind::InteractiveCreativeError,
        message,
    ))
}

fn creative_fault(cause: impl Into<String>) -> AdapterEvent {
    AdapterEvent::Failed(ErrorRecord::new(ErrorKind::InteractiveCreativeError).caused_by(cause))
}

/// Leading decimal number of a version string: `"2.0.1"` reads as 2.0.
fn parse_version(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim_start();
            let mut seen_dot = false;
            let end = s
                .char_indices()
                .find(|(_, c)| match c {
                    '0'..='9' => false,
                    '.' if !seen_dot => {
                        seen_dot = true;
                        false
                    }
                    _ => true,
                })
                .map_or(s.len(), |(i, _)| i);
            s[..end].parse().ok()
        }
        _ => None,
    }
}

/// Drives a scripted creative loaded in an isolated context.
///
/// Loading is asynchronous: the loader answers through a [`CreativeSink`]
/// tagged with this adapter's [`LoadToken`], and anything tagged with another
/// token is dropped.
pub struct InteractiveCreativeAdapter {
    min_version: u32,
    desired_bitrate: u32,
    muted: bool,
    token: Option<LoadToken>,
    sink: Option<CreativeSink>,
    creative: Option<Box<dyn CreativeObject>>,
    init_args: Vec<Value>,
}

impl InteractiveCreativeAdapter {
    pub fn new(min_version: u32, desired_bitrate: u32) -> Self {
        Self {
            min_version,
            desired_bitrate,
            muted: true,
            token: None,
            sink: None,
            creative: None,
            init_args: Vec::new(),
        }
    }

    pub fn load_token(&self) -> Option<&LoadToken> {
        self.token.as_ref()
    }

    fn handshake(&mut self, mut creative: Box<dyn CreativeObject>) -> Vec<AdapterEvent> {
        let missing: Vec<&str> = REQUIRED_METHODS
            .iter()
            .copied()
            .filter(|m| !creative.has_method(m))
            .collect();
        if !missing.is_empty() {
            return vec![creative_error(format!(
                "Missing interfaces in the VPAID creative: {}",
                missing.join(" ")
            ))];
        }

        let wanted = format!("{:.1}", f64::from(self.min_version));
        let version = creative
            .call("handshakeVersion", &[json!(wanted)])
            .ok()
            .as_ref()
            .and_then(parse_version);
        match version {
            None => return vec![creative_error("Cannot get VPAID version from the creative")],
            Some(v) if v < f64::from(self.min_version) => {
                return vec![creative_error(format!(
                    "Only support creatives with VPAID version >= {wanted}"
                ))];
            }
            Some(v) => info!(version = v, "creative handshake ok"),
        }

        let Some(sink) = self.sink.clone() else {
            return vec![creative_error("creative sink missing")];
        };
        for kind in CreativeEventKind::ALL {
            creative.subscribe(kind, sink.clone());
        }
        let init = creative.call("initAd", &self.init_args);
        self.creative = Some(creative);
        match init {
            Ok(_) => Vec::new(),
            Err(fault) => vec![creative_fault(fault.to_string())],
        }
    }

    fn translate(&mut self, event: CreativeEvent) -> Vec<AdapterEvent> {
        let event = match event {
            CreativeEvent::AdStarted => AdapterEvent::Started,
            CreativeEvent::AdStopped => AdapterEvent::Stopped,
            CreativeEvent::AdSkipped => AdapterEvent::Skipped,
            CreativeEvent::AdLoaded => AdapterEvent::Loaded,
            CreativeEvent::AdSizeChange => AdapterEvent::SizeChanged,
            CreativeEvent::AdDurationChange => {
                AdapterEvent::DurationChanged(self.query("getAdDuration"))
            }
            CreativeEvent::AdVolumeChange => AdapterEvent::VolumeChanged,
            CreativeEvent::AdImpression => AdapterEvent::Checkpoint(Checkpoint::Impression),
            CreativeEvent::AdClickThru {
                url,
                id,
                player_handles,
            } => AdapterEvent::ClickThrough {
                url,
                id,
                player_handles,
            },
            CreativeEvent::AdVideoStart => AdapterEvent::Checkpoint(Checkpoint::VideoStart),
            CreativeEvent::AdVideoFirstQuartile => {
                AdapterEvent::Checkpoint(Checkpoint::FirstQuartile)
            }
            CreativeEvent::AdVideoMidpoint => AdapterEvent::Checkpoint(Checkpoint::Midpoint),
            CreativeEvent::AdVideoThirdQuartile => {
                AdapterEvent::Checkpoint(Checkpoint::ThirdQuartile)
            }
            CreativeEvent::AdVideoComplete => AdapterEvent::Checkpoint(Checkpoint::Complete),
            CreativeEvent::AdPaused => AdapterEvent::Paused,
            CreativeEvent::AdPlaying => AdapterEvent::Playing,
            CreativeEvent::AdError { message } => creative_error(message),
            CreativeEvent::AdLog { message } => AdapterEvent::Log(message),
        };
        vec![event]
    }

    /// Call `method` if the creative exposes it. Absence is a no-op.
    fn invoke(&mut self, method: &str, args: &[Value]) -> Vec<AdapterEvent> {
        let Some(creative) = self.creative.as_mut() else {
            return Vec::new();
        };
        if !creative.has_method(method) {
            debug!(method, "creative method not available");
            return Vec::new();
        }
        match creative.call(method, args) {
            Ok(_) => Vec::new(),
            Err(fault) => {
                warn!(method, %fault, "creative call failed");
                vec![creative_fault(fault.to_string())]
            }
        }
    }

    fn query(&mut self, method: &str) -> Option<f64> {
        let creative = self.creative.as_mut()?;
        if !creative.has_method(method) {
            return None;
        }
        match creative.call(method, &[]) {
            Ok(value) => value.as_f64(),
            Err(fault) => {
                debug!(method, %fault, "creative getter failed");
                None
            }
        }
    }
}

impl CreativeAdapter for InteractiveCreativeAdapter {
    fn initialize(
        &mut self,
        cx: &mut AdapterCx<'_>,
        request: InitRequest,
    ) -> Result<LoadState, ErrorRecord> {
        let token = LoadToken::new();
        let tx = cx.signals.clone();
        let sink = CreativeSink::new(token.clone(), move |signal| {
            let _ = tx.send(Signal::Creative(signal));
        });

        let environment = EnvironmentDescriptor::new(cx.target.slot.environment(), request.autoplay);
        let environment = serde_json::to_value(&environment).map_err(|e| {
            ErrorRecord::new(ErrorKind::InteractiveCreativeError).caused_by(e.to_string())
        })?;
        let size = &request.size;
        self.init_args = vec![
            json!(size.width),
            json!(size.height),
            json!(size.view_mode),
            json!(self.desired_bitrate),
            json!({ "AdParameters": request.ad_parameters }),
            environment,
        ];
        self.muted = request.muted;

        debug!(token = %token, url = %request.variant.source_url, "opening creative");
        self.token = Some(token);
        self.sink = Some(sink.clone());
        cx.loader.open(&request.variant.source_url, sink);
        Ok(LoadState::Pending)
    }

    fn start(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        cx.target.media.set_muted(self.muted);
        self.invoke("startAd", &[])
    }

    fn pause(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("pauseAd", &[])
    }

    fn resume(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("resumeAd", &[])
    }

    fn stop(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("stopAd", &[])
    }

    fn skip(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("skipAd", &[])
    }

    fn resize(&mut self, _cx: &mut AdapterCx<'_>, size: &RenderSize) -> Vec<AdapterEvent> {
        self.invoke(
            "resizeAd",
            &[json!(size.width), json!(size.height), json!(size.view_mode)],
        )
    }

    fn collapse(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("collapseAd", &[])
    }

    fn expand(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        self.invoke("expandAd", &[])
    }

    fn set_volume(&mut self, _cx: &mut AdapterCx<'_>, volume: f64) -> Vec<AdapterEvent> {
        self.invoke("setAdVolume", &[json!(volume)])
    }

    fn volume(&mut self, _cx: &mut AdapterCx<'_>) -> Option<f64> {
        self.query("getAdVolume")
    }

    fn remaining_time(&mut self, _cx: &mut AdapterCx<'_>) -> Option<f64> {
        self.query("getAdRemainingTime")
    }

    fn duration(&mut self, _cx: &mut AdapterCx<'_>) -> Option<f64> {
        self.query("getAdDuration")
    }

    fn on_creative_signal(
        &mut self,
        _cx: &mut AdapterCx<'_>,
        signal: CreativeSignal,
    ) -> Vec<AdapterEvent> {
        if self.token.as_ref() != Some(signal.token()) {
            debug!(token = %signal.token(), "dropping signal for superseded load");
            return Vec::new();
        }
        match signal {
            CreativeSignal::Loaded { object: None, .. } => {
                vec![creative_error("VPAID creative object not obtainable")]
            }
            CreativeSignal::Loaded {
                object: Some(object),
                ..
            } => {
                if self.creative.is_some() {
                    debug!("creative already loaded, ignoring repeat delivery");
                    return Vec::new();
                }
                self.handshake(object)
            }
            CreativeSignal::LoadFailed { message, .. } => vec![creative_fault(message)],
            CreativeSignal::Event { event, .. } => {
                if self.creative.is_none() {
                    return Vec::new();
                }
                self.translate(event)
            }
        }
    }

    fn teardown(&mut self, cx: &mut AdapterCx<'_>) {
        if let Some(mut creative) = self.creative.take() {
            if creative.has_method("unsubscribe") {
                for kind in CreativeEventKind::ALL {
                    creative.unsubscribe(kind);
                }
            }
        }
        self.sink = None;
        if let Some(token) = self.token.take() {
            cx.loader.close(&token);
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }
}
