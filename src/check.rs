use std::io::Write;

use anyhow::{Context, Result};
use reel_core::errors::{ErrorKind, ErrorRecord};
use reel_core::media::StaticCapabilities;
use reel_core::model::AdResponse;
use reel_engine::selector::{pick_for_size, select_variants};
use reel_engine::sequencer::AdPod;
use serde_json::{json, Value};

/// Selection report for every ad, in pod order.
pub fn report(response: AdResponse, height: u32) -> Vec<Value> {
    let probe = StaticCapabilities::html5();
    let mut pod = AdPod::new();
    pod.load(response.ads);

    std::iter::from_fn(|| pod.take_next())
        .map(|ad| {
            let selected = ad
                .first_linear()
                .ok_or_else(|| ErrorRecord::new(ErrorKind::NonLinearUnsupported))
                .and_then(|creative| select_variants(creative, &probe));
            match selected {
                Ok(variants) => json!({
                    "ad_id": ad.id,
                    "sequence": ad.sequence,
                    "chosen": pick_for_size(&variants, height).map(|v| &v.source_url),
                    "variants": variants,
                }),
                Err(error) => json!({
                    "ad_id": ad.id,
                    "sequence": ad.sequence,
                    "error": error,
                }),
            }
        })
        .collect()
}

pub fn run(response: AdResponse, height: u32, out: &mut dyn Write) -> Result<()> {
    if response.ads.is_empty() {
        let error = ErrorRecord::new(ErrorKind::EmptyResponse);
        writeln!(out, "{}", json!({ "error": error })).context("Failed to write report")?;
        return Ok(());
    }
    for line in report(response, height) {
        writeln!(out, "{line}").context("Failed to write report")?;
    }
    Ok(())
}
