/// Sentinel for "whatever the release host currently calls latest".
pub const LATEST: &str = "latest";

/// Normalize a user-supplied version: unset or blank becomes [`LATEST`],
/// anything else is trimmed and kept verbatim.
pub fn normalize_version(version: Option<&str>) -> String {
    match version.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => LATEST.to_string(),
    }
}

pub fn is_latest(version: &str) -> bool {
    version == LATEST
}
