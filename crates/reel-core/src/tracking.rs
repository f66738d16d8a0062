use crate::model::{Ad, Creative};

/// External tracker bound to one (ad, creative) pair.
///
/// The engine treats trackers as per-call services: everything they need is
/// passed in on each call.
pub trait Tracker: Send {
    fn track_impression(&mut self);
    /// Current playback position in seconds.
    fn set_progress(&mut self, current_time: f64);
    fn set_duration(&mut self, duration: f64);
    fn set_paused(&mut self, paused: bool);
    fn set_muted(&mut self, muted: bool);
    fn complete(&mut self);
    fn skip(&mut self) {}
    /// Fire click tracking. Returns the click-through url, if the ad has one.
    fn click(&mut self) -> Option<String>;
    fn error_with_code(&mut self, _code: u32) {}
}

pub trait TrackerFactory: Send + Sync {
    fn create(&self, ad: &Ad, creative: &Creative) -> Box<dyn Tracker>;
}
