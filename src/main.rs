//! # reel
//!
//! Command-line harness for the reel engine: plays an ad response end to end
//! against in-memory collaborators, or reports which media files would be
//! selected.

#![deny(unsafe_code)]

mod check;
mod simulate;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reel_core::model::AdResponse;
use reel_settings::{LoggingSettings, ReelSettings};
use reel_telemetry::{LogQuery, RecentLogs, TelemetryConfig};
use tracing::Level;

/// Ad session orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "VAST/VPAID ad session engine")]
struct Cli {
    /// Settings file (defaults to `~/.reel/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a JSON ad response on a simulated clock, printing events as JSON lines.
    Simulate {
        response: PathBuf,
        #[arg(long, default_value = "640")]
        width: u32,
        #[arg(long, default_value = "360")]
        height: u32,
        #[arg(long, default_value = "normal")]
        view_mode: String,
    },
    /// Run media file selection only and print the eligible variants.
    Check {
        response: PathBuf,
        /// Render height used to pick the variant `init` would load.
        #[arg(long, default_value = "360")]
        height: u32,
    },
}

fn read_response(path: &Path) -> Result<AdResponse> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read response: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse response: {}", path.display()))
}

fn telemetry_config(logging: &LoggingSettings) -> TelemetryConfig {
    let level = |s: &str| s.parse::<Level>().ok();
    TelemetryConfig {
        log_level: level(&logging.level).unwrap_or(Level::INFO),
        module_levels: logging
            .module_levels
            .iter()
            .filter_map(|(module, l)| Some((module.clone(), level(l)?)))
            .collect(),
        json: logging.json,
        recent_log_capacity: logging.recent_log_capacity,
        metrics_enabled: logging.metrics_enabled,
    }
}

fn load_settings(path: Option<&Path>) -> Result<ReelSettings> {
    let settings = match path {
        Some(path) => reel_settings::load_settings_from_path(path),
        None => reel_settings::load_settings(),
    };
    settings.context("Failed to load settings")
}

/// Dump the warn+ records kept in memory to stderr, oldest first.
fn report_recent_warnings(logs: &RecentLogs) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    for record in logs.query(&LogQuery::default()).iter().rev() {
        let line = serde_json::to_string(record).context("Failed to encode log record")?;
        writeln!(stderr, "{line}").context("Failed to write diagnostics")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;
    let telemetry = reel_telemetry::init_telemetry(telemetry_config(&settings.logging));

    match cli.command {
        Command::Simulate {
            response,
            width,
            height,
            view_mode,
        } => {
            let ads = read_response(&response)?;
            // paused clock: timers resolve as soon as the session is idle
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .context("Failed to build runtime")?;
            let viewport = simulate::Viewport {
                width,
                height,
                view_mode,
            };
            let source = format!("file://{}", response.display());
            let mut stdout = std::io::stdout().lock();
            let outcome = runtime.block_on(simulate::run(
                ads,
                &source,
                &settings,
                viewport,
                telemetry.metrics().cloned(),
                &mut stdout,
            ))?;
            tracing::info!(?outcome, "simulation finished");
            if let simulate::Outcome::Failed(_) = outcome {
                report_recent_warnings(telemetry.logs())?;
            }
            if let Some(metrics) = telemetry.metrics() {
                for sample in metrics.snapshot() {
                    tracing::debug!(name = %sample.name, value = sample.value, "metric");
                }
            }
            Ok(())
        }
        Command::Check { response, height } => {
            let ads = read_response(&response)?;
            let mut stdout = std::io::stdout().lock();
            check::run(ads, height, &mut stdout)
        }
    }
}
