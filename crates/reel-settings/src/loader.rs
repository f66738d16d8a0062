//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ReelSettings::default()`]
//! 2. If `~/.reel/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `REEL_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{logging_level_ok, ReelSettings};

/// Resolve the path to the settings file (`~/.reel/settings.json`).
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".reel/settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ReelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<ReelSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn read_file_layer(path: &Path) -> Result<ReelSettings> {
    let defaults = serde_json::to_value(ReelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "merging settings file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, compiled defaults apply");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Overlay `source` on `target`: objects merge per key, anything else in
/// `source` replaces the target value, and `null` leaves it untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `REEL_*` environment overrides.
pub fn apply_env_overrides(settings: &mut ReelSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`. Invalid values are ignored with a
/// warning, leaving the file/default value in place.
pub fn apply_overrides_from(settings: &mut ReelSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Request defaults ────────────────────────────────────────────
    if let Some(v) = env.bool("REEL_AUTOPLAY") {
        settings.request.autoplay = v;
    }
    if let Some(v) = env.bool("REEL_MUTED") {
        settings.request.muted = v;
    }
    if let Some(v) = env.u64("REEL_RESPONSE_TIMEOUT_MS", 1, 600_000) {
        settings.request.response_load_timeout_ms = v;
    }
    if let Some(v) = env.u64("REEL_MEDIA_TIMEOUT_MS", 1, 600_000) {
        settings.request.media_load_timeout_ms = v;
    }
    if let Some(v) = env.bool("REEL_WITH_CREDENTIALS") {
        settings.request.with_credentials = v;
    }
    if let Some(v) = env.u64("REEL_WRAPPER_LIMIT", 0, 100) {
        settings.request.wrapper_limit = v as u32;
    }

    // ── Playback ────────────────────────────────────────────────────
    if let Some(v) = env.u64("REEL_DESIRED_BITRATE", 1, 1_000_000) {
        settings.playback.desired_bitrate = v as u32;
    }
    if let Some(v) = env.u64("REEL_MAX_MUTED_RETRIES", 0, 10) {
        settings.playback.max_muted_retries = v as u32;
    }
    if let Some(v) = env.u64("REEL_PROGRESS_POLL_MS", 50, 60_000) {
        settings.playback.progress_poll_interval_ms = v;
    }
    if let Some(v) = env.u64("REEL_POD_ADVANCE_DELAY_MS", 0, 10_000) {
        settings.playback.pod_advance_delay_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("REEL_LOG_LEVEL") {
        if logging_level_ok(&v) {
            settings.logging.level = v.to_lowercase();
        } else {
            warn!(key = "REEL_LOG_LEVEL", value = %v, "invalid log level env var, ignoring");
        }
    }
    if let Some(v) = env.bool("REEL_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"playback": {"desiredBitrate": 268, "maxMutedRetries": 3}});
        let source = serde_json::json!({"playback": {"desiredBitrate": 500}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["playback"]["desiredBitrate"], 500);
        assert_eq!(merged["playback"]["maxMutedRetries"], 3);
    }

    #[test]
    fn merge_replaces_module_level_map_entries_and_arrays() {
        let target = serde_json::json!({
            "logging": {"moduleLevels": {"reel_engine": "info"}, "level": "info"},
            "tags": ["a", "b"]
        });
        let source = serde_json::json!({
            "logging": {"moduleLevels": {"reel_core": "debug"}},
            "tags": ["c"]
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["logging"]["moduleLevels"]["reel_engine"], "info");
        assert_eq!(merged["logging"]["moduleLevels"]["reel_core"], "debug");
        assert_eq!(merged["logging"]["level"], "info");
        assert_eq!(merged["tags"], serde_json::json!(["c"]));
    }

    #[test]
    fn merge_skips_nulls() {
        let target = serde_json::json!({"request": {"muted": true, "autoplay": true}});
        let source = serde_json::json!({"request": {"muted": null, "autoplay": false}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["request"]["muted"], true);
        assert_eq!(merged["request"]["autoplay"], false);
    }

    #[test]
    fn merge_scalar_over_section_wins() {
        let target = serde_json::json!({"playback": {"desiredBitrate": 268}});
        let merged = deep_merge(target, serde_json::json!({"playback": 0}));
        assert_eq!(merged["playback"], 0);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, ReelSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"request": {"mediaLoadTimeoutMs": 5000}, "playback": {"podAdvanceDelayMs": 0}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.request.media_load_timeout_ms, 5000);
        assert_eq!(settings.request.response_load_timeout_ms, 23_000);
        assert_eq!(settings.playback.pod_advance_delay_ms, 0);
        assert_eq!(settings.playback.desired_bitrate, 268);
    }

    #[test]
    fn invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(
            read_file_layer(&path).unwrap_err(),
            SettingsError::Json(_)
        ));
    }

    #[test]
    fn out_of_range_file_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"playback": {"progressPollIntervalMs": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path).unwrap_err(),
            SettingsError::InvalidValue { .. }
        ));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = ReelSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("REEL_MUTED", "off"),
                ("REEL_MEDIA_TIMEOUT_MS", "4000"),
                ("REEL_POD_ADVANCE_DELAY_MS", "0"),
                ("REEL_LOG_LEVEL", "DEBUG"),
            ]),
        );
        assert!(!settings.request.muted);
        assert_eq!(settings.request.media_load_timeout_ms, 4000);
        assert_eq!(settings.playback.pod_advance_delay_ms, 0);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = ReelSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("REEL_AUTOPLAY", "maybe"),
                ("REEL_MAX_MUTED_RETRIES", "99"),
                ("REEL_PROGRESS_POLL_MS", "abc"),
                ("REEL_LOG_LEVEL", "loud"),
            ]),
        );
        assert_eq!(settings, ReelSettings::default());
    }

    #[test]
    fn empty_env_value_ignored() {
        let mut settings = ReelSettings::default();
        apply_overrides_from(&mut settings, env(&[("REEL_DESIRED_BITRATE", "")]));
        assert_eq!(settings.playback.desired_bitrate, 268);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_values() {
        for t in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "0", "No", "off"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("10", 0, 10), Some(10));
        assert_eq!(parse_u64_range("11", 0, 10), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
        assert_eq!(parse_u64_range(" 5 ", 0, 10), Some(5));
    }
}
