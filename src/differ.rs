//! New-asset detection
//!
//! Pure set difference between the feed's current descriptors and the
//! known-identifier set. No side effects; feed ordering is preserved.

use crate::types::AssetDescriptor;

/// Return the descriptors whose video URL is absent from `known`.
///
/// Deterministic given identical inputs; the relative order of the
/// returned descriptors matches the feed's ordering.
pub fn diff_new_assets(
    descriptors: Vec<AssetDescriptor>,
    known: &[String],
) -> Vec<AssetDescriptor> {
    descriptors
        .into_iter()
        .filter(|d| !known.iter().any(|k| k == &d.video_url))
        .collect()
}
