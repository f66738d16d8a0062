use reel_core::errors::{ErrorKind, ErrorRecord};
use reel_core::media::MediaEvent;
use reel_core::model::RenderSize;
use tracing::{debug, warn};

use super::{AdapterCx, AdapterEvent, CreativeAdapter, InitRequest, LoadState};

/// Plays a plain media file through the host's media element.
pub struct NativeMediaAdapter {
    max_muted_retries: u32,
    muted_retries: u32,
    attached: bool,
    muted: bool,
    current_time: f64,
    duration: Option<f64>,
}

impl NativeMediaAdapter {
    pub fn new(max_muted_retries: u32) -> Self {
        Self {
            max_muted_retries,
            muted_retries: 0,
            attached: false,
            muted: true,
            current_time: 0.0,
            duration: None,
        }
    }

    /// Replay muted after a rejected `play()`, up to the retry budget.
    fn retry_muted(&mut self, cx: &mut AdapterCx<'_>, mut reason: String) -> Vec<AdapterEvent> {
        loop {
            if self.muted_retries >= self.max_muted_retries {
                warn!(retries = self.muted_retries, %reason, "muted playback retries exhausted");
                return vec![AdapterEvent::Failed(
                    ErrorRecord::new(ErrorKind::PlaybackError).caused_by(reason),
                )];
            }
            self.muted_retries += 1;
            debug!(attempt = self.muted_retries, %reason, "play rejected, retrying muted");
            cx.target.media.set_muted(true);
            match cx.target.media.play() {
                Ok(()) => return vec![AdapterEvent::MutedChanged(true)],
                Err(rejected) => reason = rejected.reason,
            }
        }
    }

    /// Play, falling back to muted playback. `on_success` leads the events
    /// when playback ends up running.
    fn play(&mut self, cx: &mut AdapterCx<'_>, on_success: AdapterEvent) -> Vec<AdapterEvent> {
        match cx.target.media.play() {
            Ok(()) => vec![on_success],
            Err(rejected) => {
                let mut events = self.retry_muted(cx, rejected.reason);
                if !matches!(events.first(), Some(AdapterEvent::Failed(_))) {
                    events.insert(0, on_success);
                }
                events
            }
        }
    }
}

impl CreativeAdapter for NativeMediaAdapter {
    fn initialize(
        &mut self,
        cx: &mut AdapterCx<'_>,
        request: InitRequest,
    ) -> Result<LoadState, ErrorRecord> {
        self.muted = request.muted;
        self.muted_retries = 0;
        self.current_time = 0.0;
        self.duration = None;
        cx.target.media.set_source(Some(&request.variant.source_url));
        self.attached = true;
        Ok(LoadState::Ready)
    }

    fn start(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        if !self.attached {
            return Vec::new();
        }
        cx.target.media.set_muted(self.muted);
        cx.target.media.load();
        self.play(cx, AdapterEvent::Started)
    }

    fn pause(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        if !self.attached {
            return Vec::new();
        }
        cx.target.media.pause();
        vec![AdapterEvent::Paused]
    }

    fn resume(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        if !self.attached {
            return Vec::new();
        }
        self.play(cx, AdapterEvent::Playing)
    }

    fn stop(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        if !self.attached {
            return Vec::new();
        }
        cx.target.media.pause();
        vec![AdapterEvent::Stopped]
    }

    fn skip(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        if !self.attached {
            return Vec::new();
        }
        cx.target.media.pause();
        vec![AdapterEvent::Skipped]
    }

    fn resize(&mut self, _cx: &mut AdapterCx<'_>, _size: &RenderSize) -> Vec<AdapterEvent> {
        vec![AdapterEvent::SizeChanged]
    }

    fn collapse(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        Vec::new()
    }

    fn expand(&mut self, _cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent> {
        Vec::new()
    }

    fn set_volume(&mut self, cx: &mut AdapterCx<'_>, volume: f64) -> Vec<AdapterEvent> {
        if cx.target.media.volume() == volume {
            return Vec::new();
        }
        cx.target.media.set_volume(volume);
        vec![AdapterEvent::VolumeChanged]
    }

    fn volume(&mut self, cx: &mut AdapterCx<'_>) -> Option<f64> {
        if cx.target.media.is_muted() {
            Some(0.0)
        } else {
            Some(cx.target.media.volume())
        }
    }

    fn remaining_time(&mut self, _cx: &mut AdapterCx<'_>) -> Option<f64> {
        self.duration
            .filter(|d| *d > 0.0)
            .map(|d| (d - self.current_time).max(0.0))
    }

    fn duration(&mut self, _cx: &mut AdapterCx<'_>) -> Option<f64> {
        self.duration
    }

    fn on_media_event(&mut self, cx: &mut AdapterCx<'_>, event: MediaEvent) -> Vec<AdapterEvent> {
        if !self.attached {
            debug!(?event, "media event ignored, adapter detached");
            return Vec::new();
        }
        match event {
            MediaEvent::TimeUpdate {
                current_time,
                duration,
            } => {
                self.current_time = current_time;
                if duration > 0.0 {
                    self.duration = Some(duration);
                }
                vec![AdapterEvent::Progress {
                    current_time,
                    duration,
                }]
            }
            MediaEvent::MetadataLoaded { duration } => {
                self.duration = Some(duration);
                vec![AdapterEvent::DurationChanged(Some(duration))]
            }
            MediaEvent::Ended => vec![AdapterEvent::Ended],
            MediaEvent::VolumeChange { muted, .. } => vec![AdapterEvent::MutedChanged(muted)],
            MediaEvent::PlayRejected { reason } => self.retry_muted(cx, reason),
            MediaEvent::Error { message } => vec![AdapterEvent::Failed(
                ErrorRecord::new(ErrorKind::PlaybackError).caused_by(message),
            )],
        }
    }

    fn teardown(&mut self, _cx: &mut AdapterCx<'_>) {
        self.attached = false;
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use reel_core::media::RenderTarget;
    use reel_core::model::MediaVariant;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mock::{FakeCreativeLoader, FakeMediaElement, FakeSlot};

    struct Rig {
        target: RenderTarget,
        loader: FakeCreativeLoader,
        tx: crate::signal::SignalSender,
        media: FakeMediaElement,
    }

    impl Rig {
        fn new() -> Self {
            let media = FakeMediaElement::new();
            let (tx, _rx) = mpsc::unbounded_channel();
            Self {
                target: RenderTarget::new(Box::new(FakeSlot::new()), Box::new(media.clone())),
                loader: FakeCreativeLoader::manual(),
                tx,
                media,
            }
        }

        fn cx(&mut self) -> AdapterCx<'_> {
            AdapterCx {
                target: &mut self.target,
                loader: &mut self.loader,
                signals: &self.tx,
            }
        }
    }

    fn request(muted: bool) -> InitRequest {
        InitRequest {
            variant: MediaVariant::new("video/mp4", 640, 360, "https://cdn/ad.mp4"),
            size: RenderSize::default(),
            ad_parameters: None,
            autoplay: true,
            muted,
        }
    }

    #[test]
    fn initialize_sets_source_and_is_ready() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(3);
        let state = adapter.initialize(&mut rig.cx(), request(true)).unwrap();
        assert_eq!(state, LoadState::Ready);
        assert_eq!(rig.media.snapshot().source.as_deref(), Some("https://cdn/ad.mp4"));
    }

    #[test]
    fn start_plays_with_requested_mute() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(false)).unwrap();
        assert_eq!(adapter.start(&mut rig.cx()), vec![AdapterEvent::Started]);
        let state = rig.media.snapshot();
        assert_eq!(state.loads, 1);
        assert_eq!(state.plays, 1);
        assert!(!state.muted);
    }

    #[test]
    fn rejected_play_retries_muted() {
        let mut rig = Rig::new();
        rig.media.reject_next_plays(2);
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(false)).unwrap();
        assert_eq!(
            adapter.start(&mut rig.cx()),
            vec![AdapterEvent::Started, AdapterEvent::MutedChanged(true)]
        );
        let state = rig.media.snapshot();
        assert_eq!(state.plays, 3);
        assert!(state.muted);
    }

    #[test]
    fn retries_are_bounded() {
        let mut rig = Rig::new();
        rig.media.reject_next_plays(10);
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(false)).unwrap();
        let events = adapter.start(&mut rig.cx());
        assert_eq!(events.len(), 1);
        match &events[0] {
            AdapterEvent::Failed(err) => {
                assert_eq!(err.kind(), ErrorKind::PlaybackError);
                assert!(err.inner_cause().is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rig.media.snapshot().plays, 4);
    }

    #[test]
    fn async_rejection_shares_retry_budget() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(1);
        adapter.initialize(&mut rig.cx(), request(false)).unwrap();
        adapter.start(&mut rig.cx());

        let rejected = || MediaEvent::PlayRejected {
            reason: "NotAllowedError".into(),
        };
        assert_eq!(
            adapter.on_media_event(&mut rig.cx(), rejected()),
            vec![AdapterEvent::MutedChanged(true)]
        );
        assert!(matches!(
            adapter.on_media_event(&mut rig.cx(), rejected()).as_slice(),
            [AdapterEvent::Failed(_)]
        ));
    }

    #[test]
    fn media_events_map_and_track_remaining() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(true)).unwrap();

        assert_eq!(
            adapter.on_media_event(&mut rig.cx(), MediaEvent::MetadataLoaded { duration: 30.0 }),
            vec![AdapterEvent::DurationChanged(Some(30.0))]
        );
        adapter.on_media_event(
            &mut rig.cx(),
            MediaEvent::TimeUpdate {
                current_time: 12.0,
                duration: 30.0,
            },
        );
        assert_eq!(adapter.remaining_time(&mut rig.cx()), Some(18.0));
        assert_eq!(
            adapter.on_media_event(&mut rig.cx(), MediaEvent::Ended),
            vec![AdapterEvent::Ended]
        );
    }

    #[test]
    fn detached_adapter_ignores_media_events() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(true)).unwrap();
        adapter.teardown(&mut rig.cx());
        assert!(adapter.on_media_event(&mut rig.cx(), MediaEvent::Ended).is_empty());
        assert!(adapter.stop(&mut rig.cx()).is_empty());
    }

    #[test]
    fn volume_reads_zero_when_muted() {
        let mut rig = Rig::new();
        let mut adapter = NativeMediaAdapter::new(3);
        adapter.initialize(&mut rig.cx(), request(true)).unwrap();
        adapter.start(&mut rig.cx());
        assert_eq!(adapter.volume(&mut rig.cx()), Some(0.0));

        assert_eq!(
            adapter.set_volume(&mut rig.cx(), 0.4),
            vec![AdapterEvent::VolumeChanged]
        );
        assert!(adapter.set_volume(&mut rig.cx(), 0.4).is_empty());
    }
}
