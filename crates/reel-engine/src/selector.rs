use reel_core::errors::{ErrorKind, ErrorRecord};
use reel_core::media::CapabilityProbe;
use reel_core::model::{Creative, MediaVariant};

/// Playable variants of `creative`, sorted by height ascending.
///
/// Interactive packages are always eligible. The sort is stable, so variants
/// of equal height keep their document order.
pub fn select_variants(
    creative: &Creative,
    probe: &dyn CapabilityProbe,
) -> Result<Vec<MediaVariant>, ErrorRecord> {
    if creative.media_files.is_empty() {
        return Err(ErrorRecord::new(ErrorKind::AssetNotFound));
    }

    let mut eligible: Vec<MediaVariant> = creative
        .media_files
        .iter()
        .filter(|v| v.is_interactive_package() || probe.can_play(&v.mime_type))
        .cloned()
        .collect();

    if eligible.is_empty() {
        return Err(ErrorRecord::new(ErrorKind::LinearAssetMismatch));
    }

    eligible.sort_by_key(|v| v.height);
    Ok(eligible)
}

/// First variant at least `target_height` tall, else the largest one.
/// `None` only for an empty list.
pub fn pick_for_size(variants: &[MediaVariant], target_height: u32) -> Option<&MediaVariant> {
    variants
        .iter()
        .find(|v| v.height >= target_height)
        .or_else(|| variants.last())
}
