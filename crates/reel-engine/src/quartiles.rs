use reel_core::events::AdEvent;

/// Progress checkpoints in firing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Checkpoint {
    Impression,
    VideoStart,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
}

impl Checkpoint {
    pub const ORDER: [Checkpoint; 6] = [
        Self::Impression,
        Self::VideoStart,
        Self::FirstQuartile,
        Self::Midpoint,
        Self::ThirdQuartile,
        Self::Complete,
    ];

    /// Percent of the duration at which this checkpoint fires.
    pub fn threshold(self) -> f64 {
        match self {
            Self::Impression | Self::VideoStart => 0.0,
            Self::FirstQuartile => 25.0,
            Self::Midpoint => 50.0,
            Self::ThirdQuartile => 75.0,
            Self::Complete => 100.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn to_event(self) -> AdEvent {
        match self {
            Self::Impression => AdEvent::Impression,
            Self::VideoStart => AdEvent::VideoStart,
            Self::FirstQuartile => AdEvent::FirstQuartile,
            Self::Midpoint => AdEvent::Midpoint,
            Self::ThirdQuartile => AdEvent::ThirdQuartile,
            Self::Complete => AdEvent::VideoComplete,
        }
    }
}

/// Cursor over [`Checkpoint::ORDER`]. Every checkpoint fires at most once per
/// ad, in order, whether reached by a progress sample or reported directly.
#[derive(Debug, Default)]
pub struct QuartileTracker {
    next: usize,
}

impl QuartileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkpoints newly reached by a progress sample.
    pub fn observe(&mut self, percent: f64) -> Vec<Checkpoint> {
        let mut fired = Vec::new();
        while let Some(checkpoint) = Checkpoint::ORDER.get(self.next) {
            // NaN compares false, so a bogus sample fires nothing
            if !(percent >= checkpoint.threshold()) {
                break;
            }
            fired.push(*checkpoint);
            self.next += 1;
        }
        fired
    }

    /// Advance through `checkpoint`, flushing any skipped earlier ones.
    /// Empty if the cursor is already past it.
    pub fn reach(&mut self, checkpoint: Checkpoint) -> Vec<Checkpoint> {
        let target = checkpoint.index();
        if self.next > target {
            return Vec::new();
        }
        let fired = Checkpoint::ORDER[self.next..=target].to_vec();
        self.next = target + 1;
        fired
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
