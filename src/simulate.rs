//! End-to-end playback against the in-memory collaborators.
//!
//! The host side is played by this module: it calls `init` on every
//! `session_ready`, `start` on every `loaded`, and drives a simulated media
//! clock (native files) or creative script (interactive packages) once an ad
//! has started.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reel_core::creative::CreativeEvent;
use reel_core::errors::ErrorRecord;
use reel_core::events::AdEvent;
use reel_core::media::{MediaEvent, RenderTarget, StaticCapabilities};
use reel_core::model::AdResponse;
use reel_engine::mock::{
    FakeCreativeLoader, FakeMediaElement, FakeSlot, RecordingTrackers, ScriptedCreative,
    StaticParser,
};
use reel_engine::{AdsManager, Collaborators, MediaEventSender};
use reel_settings::ReelSettings;
use reel_telemetry::MetricsRecorder;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Clip length used when a creative does not declare one.
const DEFAULT_CLIP_SECONDS: f64 = 15.0;
/// Spacing of simulated `timeupdate` samples.
const CLOCK_TICK: Duration = Duration::from_millis(250);
/// Upper bound on simulated time for one run.
const SESSION_DEADLINE: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub view_mode: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed,
    Failed(ErrorRecord),
}

/// Feeds `timeupdate` samples for a clip of `duration` seconds, then `ended`.
fn native_clock(media: MediaEventSender, duration: f64) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !media.send(MediaEvent::MetadataLoaded { duration }) {
            return;
        }
        let mut current_time = 0.0_f64;
        loop {
            let sample = MediaEvent::TimeUpdate {
                current_time: current_time.min(duration),
                duration,
            };
            if !media.send(sample) {
                return;
            }
            if current_time >= duration {
                break;
            }
            tokio::time::sleep(CLOCK_TICK).await;
            current_time += CLOCK_TICK.as_secs_f64();
        }
        media.send(MediaEvent::Ended);
    })
}

/// Counts the creative's remaining time down, then completes and stops it.
fn creative_clock(creative: ScriptedCreative, duration: f64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let creative = creative.with_timing(duration, duration);
        creative.emit(CreativeEvent::AdImpression);
        let mut remaining = duration;
        while remaining > 0.0 {
            tokio::time::sleep(CLOCK_TICK).await;
            remaining = (remaining - CLOCK_TICK.as_secs_f64()).max(0.0);
            creative.set_remaining(remaining);
        }
        creative.emit(CreativeEvent::AdVideoComplete);
        creative.emit(CreativeEvent::AdStopped);
    })
}

fn write_event(out: &mut dyn Write, event: &AdEvent) -> Result<()> {
    serde_json::to_writer(&mut *out, event).context("Failed to encode event")?;
    writeln!(out).context("Failed to write event")?;
    Ok(())
}

/// Play `response` to completion, writing every canonical event to `out` as
/// one JSON object per line.
pub async fn run(
    response: AdResponse,
    source: &str,
    settings: &ReelSettings,
    viewport: Viewport,
    metrics: Option<Arc<MetricsRecorder>>,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let creative = ScriptedCreative::vpaid2();
    let target = RenderTarget::new(
        Box::new(FakeSlot::new()),
        Box::new(FakeMediaElement::new()),
    );
    let collaborators = Collaborators {
        parser: Arc::new(StaticParser::respond(response)),
        probe: Arc::new(StaticCapabilities::html5()),
        trackers: Arc::new(RecordingTrackers::new()),
        loader: Box::new(FakeCreativeLoader::delivering(creative.clone())),
    };
    let mut manager = AdsManager::new(target, collaborators, settings)?;
    if let Some(metrics) = metrics {
        manager = manager.with_metrics(metrics);
    }
    let mut events = manager.subscribe();
    let media = manager.media_events();

    manager.request_ads(Some(source), None);

    let mut clock: Option<JoinHandle<()>> = None;
    let deadline = tokio::time::Instant::now() + SESSION_DEADLINE;
    let outcome = 'session: loop {
        match tokio::time::timeout_at(deadline, manager.step()).await {
            Ok(true) => {}
            Ok(false) => bail!("session ended without completing"),
            Err(_) => bail!("session still running after {SESSION_DEADLINE:?} of simulated time"),
        }

        loop {
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "event output fell behind");
                    continue;
                }
                Err(TryRecvError::Closed) => bail!("event stream closed"),
            };
            write_event(out, &event)?;
            match event {
                AdEvent::SessionReady => {
                    manager.init(viewport.width, viewport.height, &viewport.view_mode)
                }
                AdEvent::Loaded => manager.start(),
                AdEvent::Started => {
                    let duration = manager
                        .current_ad()
                        .and_then(|(_, creative)| creative.duration)
                        .unwrap_or(DEFAULT_CLIP_SECONDS);
                    debug!(duration, interactive = manager.session().is_interactive, "clock started");
                    let handle = if manager.session().is_interactive {
                        creative_clock(creative.clone(), duration)
                    } else {
                        native_clock(media.clone(), duration)
                    };
                    if let Some(previous) = clock.replace(handle) {
                        previous.abort();
                    }
                }
                AdEvent::Stopped | AdEvent::Skipped => {
                    if let Some(previous) = clock.take() {
                        previous.abort();
                    }
                }
                AdEvent::AllCompleted => break 'session Outcome::Completed,
                AdEvent::Error { error } => break 'session Outcome::Failed(error),
                _ => {}
            }
        }
    };

    if let Some(handle) = clock.take() {
        handle.abort();
    }
    manager.destroy();
    out.flush().context("Failed to flush output")?;
    Ok(outcome)
}
