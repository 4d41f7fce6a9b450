//! Claimed-digest key selection.

use super::compute::{calculate_digest, AlgorithmFamily, VersionContext};

/// Find which configured key produced `claimed`, scanning in list order and
/// returning the first exact match.
///
/// Clients digest only path + key + context on the request side, never the
/// request body, so every candidate is computed over an empty payload. An
/// empty or garbage claimed digest resolves to `None`.
pub fn select_key(
    keys: &[String],
    claimed: &str,
    path: &str,
    salt: &str,
    version: Option<VersionContext>,
    family: AlgorithmFamily,
) -> Option<String> {
    if claimed.is_empty() {
        return None;
    }
    keys.iter()
        .find(|key| calculate_digest(key, path, &[], salt, version, false, family) == claimed)
        .cloned()
}
