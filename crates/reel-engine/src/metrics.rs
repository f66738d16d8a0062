//! Metric names recorded by the controller.

pub const REQUESTS_TOTAL: &str = "reel.requests.total";
/// Labelled with `kind`.
pub const ERRORS_TOTAL: &str = "reel.errors.total";
pub const IMPRESSIONS_TOTAL: &str = "reel.impressions.total";
pub const ADS_COMPLETED_TOTAL: &str = "reel.ads.completed.total";
pub const POD_ADVANCES_TOTAL: &str = "reel.pod.advances.total";
/// Ads still queued in the current pod.
pub const POD_REMAINING: &str = "reel.pod.remaining";
pub const REQUEST_DURATION_MS: &str = "reel.request.duration_ms";
