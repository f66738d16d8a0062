//! Creative adapters: one per rendering path.
//!
//! Adapters drive the render target or the creative object and report what
//! happened as [`AdapterEvent`]s. They never touch session state; the
//! controller translates their events into canonical ones.

mod interactive;
mod native;

pub use interactive::InteractiveCreativeAdapter;
pub use native::NativeMediaAdapter;

use reel_core::creative::{CreativeLoader, CreativeSignal};
use reel_core::errors::ErrorRecord;
use reel_core::media::{MediaEvent, RenderTarget};
use reel_core::model::{MediaVariant, RenderSize};

use crate::quartiles::Checkpoint;
use crate::signal::SignalSender;

/// Borrowed controller resources an adapter may use during one call.
pub struct AdapterCx<'a> {
    pub target: &'a mut RenderTarget,
    pub loader: &'a mut dyn CreativeLoader,
    pub signals: &'a SignalSender,
}

/// Everything needed to bring a creative up.
#[derive(Clone, Debug)]
pub struct InitRequest {
    pub variant: MediaVariant,
    pub size: RenderSize,
    pub ad_parameters: Option<String>,
    pub autoplay: bool,
    pub muted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Creative is playable now.
    Ready,
    /// Readiness arrives later as an [`AdapterEvent::Loaded`].
    Pending,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdapterEvent {
    Loaded,
    Started,
    Stopped,
    Skipped,
    /// Media reached its natural end.
    Ended,
    SizeChanged,
    DurationChanged(Option<f64>),
    VolumeChanged,
    MutedChanged(bool),
    ClickThrough {
        url: Option<String>,
        id: Option<String>,
        player_handles: bool,
    },
    Progress {
        current_time: f64,
        duration: f64,
    },
    /// Checkpoint reported by the creative itself.
    Checkpoint(Checkpoint),
    Paused,
    Playing,
    Failed(ErrorRecord),
    Log(String),
}

pub trait CreativeAdapter: Send {
    fn initialize(
        &mut self,
        cx: &mut AdapterCx<'_>,
        request: InitRequest,
    ) -> Result<LoadState, ErrorRecord>;

    fn start(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn pause(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn resume(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn stop(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn skip(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn resize(&mut self, cx: &mut AdapterCx<'_>, size: &RenderSize) -> Vec<AdapterEvent>;
    fn collapse(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn expand(&mut self, cx: &mut AdapterCx<'_>) -> Vec<AdapterEvent>;
    fn set_volume(&mut self, cx: &mut AdapterCx<'_>, volume: f64) -> Vec<AdapterEvent>;

    fn volume(&mut self, cx: &mut AdapterCx<'_>) -> Option<f64>;
    fn remaining_time(&mut self, cx: &mut AdapterCx<'_>) -> Option<f64>;
    fn duration(&mut self, cx: &mut AdapterCx<'_>) -> Option<f64>;

    fn on_media_event(&mut self, _cx: &mut AdapterCx<'_>, _event: MediaEvent) -> Vec<AdapterEvent> {
        Vec::new()
    }

    fn on_creative_signal(
        &mut self,
        _cx: &mut AdapterCx<'_>,
        _signal: CreativeSignal,
    ) -> Vec<AdapterEvent> {
        Vec::new()
    }

    /// Release everything the adapter holds. Safe to call more than once.
    fn teardown(&mut self, cx: &mut AdapterCx<'_>);

    fn is_interactive(&self) -> bool;
}
