use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::signal::{Signal, SignalSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Deadline for the parser to resolve a request.
    ResponseLoad,
    /// Deadline for an interactive creative to report `AdLoaded`.
    MediaLoad,
    /// Grace delay before the next pod ad is selected.
    PodAdvance,
    /// Periodic interactive remaining-time poll.
    ProgressPoll,
}

struct Armed {
    generation: u64,
    cancel: CancellationToken,
}

impl Armed {
    fn disarm(self) {
        self.cancel.cancel();
    }
}

/// Owns every timer task of a session.
///
/// Each armed timer gets a fresh generation number; a fired signal is only
/// honoured while its generation is still the live one for that kind, so
/// ticks racing a cancellation are discarded.
pub struct TimeoutGuard {
    tx: SignalSender,
    next_generation: u64,
    response: Option<Armed>,
    media: Option<Armed>,
    pod: Option<Armed>,
    poll: Option<Armed>,
}

impl TimeoutGuard {
    pub fn new(tx: SignalSender) -> Self {
        Self {
            tx,
            next_generation: 0,
            response: None,
            media: None,
            pod: None,
            poll: None,
        }
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Armed> {
        match kind {
            TimerKind::ResponseLoad => &mut self.response,
            TimerKind::MediaLoad => &mut self.media,
            TimerKind::PodAdvance => &mut self.pod,
            TimerKind::ProgressPoll => &mut self.poll,
        }
    }

    fn next_armed(&mut self) -> (u64, CancellationToken) {
        self.next_generation += 1;
        (self.next_generation, CancellationToken::new())
    }

    /// Arm a one-shot timer, replacing any live timer of the same kind.
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, kind: TimerKind, after: Duration) -> u64 {
        self.cancel(kind);
        let (generation, cancel) = self.next_armed();
        let token = cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(Signal::Timer { kind, generation });
                }
            }
        });
        *self.slot(kind) = Some(Armed { generation, cancel });
        trace!(?kind, generation, ?after, "timer armed");
        generation
    }

    /// Start the periodic poll. The first tick arrives one `period` from now.
    pub fn start_poll(&mut self, period: Duration) -> u64 {
        self.cancel(TimerKind::ProgressPoll);
        let (generation, cancel) = self.next_armed();
        let token = cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let signal = Signal::Timer { kind: TimerKind::ProgressPoll, generation };
                        if tx.send(signal).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.poll = Some(Armed { generation, cancel });
        generation
    }

    /// Whether a fired `(kind, generation)` is still live. One-shot timers are
    /// disarmed by a successful fire; the poll stays armed.
    pub fn fire(&mut self, kind: TimerKind, generation: u64) -> bool {
        let live = matches!(self.slot(kind), Some(armed) if armed.generation == generation);
        if live && kind != TimerKind::ProgressPoll {
            *self.slot(kind) = None;
        }
        live
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(armed) = self.slot(kind).take() {
            armed.disarm();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::ResponseLoad => self.response.is_some(),
            TimerKind::MediaLoad => self.media.is_some(),
            TimerKind::PodAdvance => self.pod.is_some(),
            TimerKind::ProgressPoll => self.poll.is_some(),
        }
    }

    pub fn clear_all(&mut self) {
        for kind in [
            TimerKind::ResponseLoad,
            TimerKind::MediaLoad,
            TimerKind::PodAdvance,
            TimerKind::ProgressPoll,
        ] {
            self.cancel(kind);
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.clear_all();
    }
}
