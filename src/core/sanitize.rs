//! Path segment sanitizing.

/// Characters never allowed in a path segment
pub const FORBIDDEN_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip forbidden characters from a label. `None` yields an empty string.
///
/// This is a denylist, not full filesystem safety: reserved names,
/// trailing dots and length limits are left alone.
pub fn sanitize(label: Option<&str>) -> String {
    label
        .map(|s| s.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect())
        .unwrap_or_default()
}
