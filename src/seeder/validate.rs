//! Identifier validation.
//!
//! Single choke point preventing path traversal and registry-key
//! injection: every externally supplied path component passes through
//! here before touching the filesystem or being echoed into a registry
//! key.

use uuid::Uuid;

/// Whether a value is safe to use as a single path component.
pub fn is_safe_identifier(value: &str) -> bool {
    !value.trim().is_empty()
        && !value.contains("..")
        && !value.contains('/')
        && !value.contains('\\')
}

/// Whether a movie id is acceptable: a UUID, or any safe component.
pub fn is_valid_movie_id(movie_id: &str) -> bool {
    if movie_id.trim().is_empty() {
        return false;
    }
    Uuid::parse_str(movie_id).is_ok() || is_safe_identifier(movie_id)
}

/// Trim a segment id; `None` when nothing remains.
pub fn normalize_segment_id(segment_id: &str) -> Option<&str> {
    let trimmed = segment_id.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
