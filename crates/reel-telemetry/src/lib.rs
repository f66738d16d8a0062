mod logging;
mod metrics;

pub use logging::{Correlation, LogQuery, LogRecord, RecentLogLayer, RecentLogs};
pub use metrics::{HistogramSummary, MetricSample, MetricType, MetricsRecorder};

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "reel_engine" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines when true, human-readable otherwise.
    pub json: bool,
    /// How many warn+ records the in-memory ring keeps.
    pub recent_log_capacity: usize,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: true,
            recent_log_capacity: 256,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Build the filter directive string, e.g. `info,reel_engine=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Handle to the in-memory diagnostics installed by [`init_telemetry`].
pub struct TelemetryGuard {
    recent_logs: Arc<RecentLogs>,
    metrics_recorder: Option<Arc<MetricsRecorder>>,
}

impl TelemetryGuard {
    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.metrics_recorder.as_ref()
    }

    pub fn logs(&self) -> &RecentLogs {
        &self.recent_logs
    }
}

/// Initialize the telemetry subsystem. Call once at startup; later calls keep
/// the first subscriber and only return fresh buffers.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    // stdout is reserved for host-facing output
    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };

    let recent_logs = Arc::new(RecentLogs::new(config.recent_log_capacity));

    if let Err(e) = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(RecentLogLayer::new(recent_logs.clone()))
        .try_init()
    {
        eprintln!("reel-telemetry: subscriber already installed: {e}");
    }

    let metrics_recorder = config.metrics_enabled.then(|| Arc::new(MetricsRecorder::new()));

    TelemetryGuard {
        recent_logs,
        metrics_recorder,
    }
}
