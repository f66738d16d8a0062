use reel_core::creative::CreativeSignal;
use reel_core::ids::RequestId;
use reel_core::media::MediaEvent;
use reel_core::model::AdResponse;
use reel_core::parser::ParseError;
use tokio::sync::mpsc;

use crate::timers::TimerKind;

/// Everything that can wake the controller. Producers post these; the
/// controller processes them one at a time.
#[derive(Debug)]
pub enum Signal {
    Response {
        request: RequestId,
        result: Result<AdResponse, ParseError>,
    },
    Timer {
        kind: TimerKind,
        generation: u64,
    },
    Creative(CreativeSignal),
    Media(MediaEvent),
}

pub type SignalSender = mpsc::UnboundedSender<Signal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Handle the host uses to forward media element callbacks.
#[derive(Clone, Debug)]
pub struct MediaEventSender {
    tx: SignalSender,
}

impl MediaEventSender {
    pub(crate) fn new(tx: SignalSender) -> Self {
        Self { tx }
    }

    /// Returns false once the controller is gone.
    pub fn send(&self, event: MediaEvent) -> bool {
        self.tx.send(Signal::Media(event)).is_ok()
    }
}
