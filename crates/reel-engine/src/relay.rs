use reel_core::tracking::Tracker;

/// Forwards playback facts to the tracker bound to the current ad.
/// Every call is a no-op while nothing is bound.
#[derive(Default)]
pub struct TrackingRelay {
    tracker: Option<Box<dyn Tracker>>,
    completed: bool,
}

impl TrackingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, tracker: Box<dyn Tracker>) {
        self.tracker = Some(tracker);
        self.completed = false;
    }

    pub fn release(&mut self) {
        self.tracker = None;
        self.completed = false;
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_some()
    }

    pub fn impression(&mut self) {
        if let Some(t) = self.tracker.as_mut() {
            t.track_impression();
        }
    }

    pub fn progress(&mut self, current_time: f64) {
        if let Some(t) = self.tracker.as_mut() {
            t.set_progress(current_time);
        }
    }

    pub fn duration(&mut self, duration: f64) {
        if let Some(t) = self.tracker.as_mut() {
            t.set_duration(duration);
        }
    }

    pub fn paused(&mut self, paused: bool) {
        if let Some(t) = self.tracker.as_mut() {
            t.set_paused(paused);
        }
    }

    pub fn muted(&mut self, muted: bool) {
        if let Some(t) = self.tracker.as_mut() {
            t.set_muted(muted);
        }
    }

    /// Completion is reported once per bound tracker.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        if let Some(t) = self.tracker.as_mut() {
            t.complete();
            self.completed = true;
        }
    }

    pub fn skip(&mut self) {
        if let Some(t) = self.tracker.as_mut() {
            t.skip();
        }
    }

    pub fn click(&mut self) -> Option<String> {
        self.tracker.as_mut().and_then(|t| t.click())
    }

    pub fn error(&mut self, code: u32) {
        if let Some(t) = self.tracker.as_mut() {
            t.error_with_code(code);
        }
    }
}
