#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use reel_core::events::{AdEvent, AdEventKind};
use reel_core::media::{MediaEvent, RenderTarget, StaticCapabilities};
use reel_core::model::{Ad, AdResponse, Creative, CreativeKind, MediaVariant, INTERACTIVE_MIME_TYPE};
use reel_engine::mock::{FakeCreativeLoader, FakeMediaElement, FakeSlot, RecordingTrackers, StaticParser};
use reel_engine::{AdsManager, Collaborators};
use reel_settings::ReelSettings;
use reel_telemetry::MetricsRecorder;
use tokio::sync::broadcast;

pub struct Harness {
    pub manager: AdsManager,
    pub events: broadcast::Receiver<AdEvent>,
    pub media: FakeMediaElement,
    pub slot: FakeSlot,
    pub parser: StaticParser,
    pub trackers: RecordingTrackers,
    pub loader: FakeCreativeLoader,
    pub metrics: Arc<MetricsRecorder>,
}

pub struct HarnessBuilder {
    parser: StaticParser,
    loader: FakeCreativeLoader,
    trackers: RecordingTrackers,
    settings: ReelSettings,
}

impl HarnessBuilder {
    pub fn loader(mut self, loader: FakeCreativeLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn trackers(mut self, trackers: RecordingTrackers) -> Self {
        self.trackers = trackers;
        self
    }

    pub fn settings(mut self, f: impl FnOnce(&mut ReelSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    pub fn build(self) -> Harness {
        let media = FakeMediaElement::new();
        let slot = FakeSlot::new();
        let metrics = Arc::new(MetricsRecorder::new());
        let manager = AdsManager::new(
            RenderTarget::new(Box::new(slot.clone()), Box::new(media.clone())),
            Collaborators {
                parser: Arc::new(self.parser.clone()),
                probe: Arc::new(StaticCapabilities::html5()),
                trackers: Arc::new(self.trackers.clone()),
                loader: Box::new(self.loader.clone()),
            },
            &self.settings,
        )
        .unwrap()
        .with_metrics(metrics.clone());
        let events = manager.subscribe();
        Harness {
            manager,
            events,
            media,
            slot,
            parser: self.parser,
            trackers: self.trackers,
            loader: self.loader,
            metrics,
        }
    }
}

impl Harness {
    pub fn builder(parser: StaticParser) -> HarnessBuilder {
        HarnessBuilder {
            parser,
            loader: FakeCreativeLoader::manual(),
            trackers: RecordingTrackers::new(),
            settings: ReelSettings::default(),
        }
    }

    pub fn new(parser: StaticParser) -> Self {
        Self::builder(parser).build()
    }

    /// Let spawned tasks run, then apply whatever they queued.
    pub async fn settle(&mut self) {
        loop {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            if self.manager.process_pending() == 0 {
                break;
            }
        }
    }

    pub async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        self.settle().await;
    }

    pub async fn feed(&mut self, event: MediaEvent) {
        assert!(self.manager.media_events().send(event));
        self.settle().await;
    }

    /// Request with default options and wait for the response.
    pub async fn request(&mut self) {
        self.manager.request_ads(Some("https://ads.example/vast.xml"), None);
        self.settle().await;
    }

    pub fn drain(&mut self) -> Vec<AdEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    pub fn kinds(&mut self) -> Vec<AdEventKind> {
        self.drain().iter().map(AdEvent::kind).collect()
    }

    /// The single error event among `events`.
    pub fn error_of(events: &[AdEvent]) -> reel_core::errors::ErrorRecord {
        let errors: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AdEvent::Error { error } => Some(error.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 1, "expected one error in {events:?}");
        errors[0].clone()
    }
}

pub fn native_ad(id: &str, sequence: Option<i64>) -> Ad {
    Ad {
        id: Some(id.into()),
        sequence,
        creatives: vec![Creative::linear(vec![
            MediaVariant::new("video/mp4", 1280, 720, format!("https://cdn/{id}-720.mp4")),
            MediaVariant::new("video/mp4", 640, 360, format!("https://cdn/{id}-360.mp4")),
        ])],
    }
}

pub fn interactive_ad(id: &str, sequence: Option<i64>) -> Ad {
    Ad {
        id: Some(id.into()),
        sequence,
        creatives: vec![Creative {
            ad_parameters: Some("{\"campaign\":7}".into()),
            ..Creative::linear(vec![MediaVariant::new(
                INTERACTIVE_MIME_TYPE,
                640,
                360,
                format!("https://cdn/{id}.js"),
            )])
        }],
    }
}

pub fn non_linear_ad(id: &str) -> Ad {
    Ad {
        id: Some(id.into()),
        sequence: None,
        creatives: vec![Creative {
            kind: CreativeKind::NonLinear,
            ..Creative::linear(vec![MediaVariant::new("image/png", 300, 50, "https://cdn/b.png")])
        }],
    }
}

pub fn response(ads: Vec<Ad>) -> AdResponse {
    AdResponse { ads }
}

/// Progress samples for a clip of `duration` seconds at the given percents.
pub fn samples(duration: f64, percents: &[f64]) -> Vec<MediaEvent> {
    percents
        .iter()
        .map(|p| MediaEvent::TimeUpdate {
            current_time: duration * p / 100.0,
            duration,
        })
        .collect()
}
