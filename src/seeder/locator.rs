//! Cache path resolution.

use std::path::{Path, PathBuf};

use super::validate::normalize_segment_id;

/// Resolve a segment request to a cached file, if present.
///
/// Resolution is a pure filesystem lookup under
/// `cache_root/movie_id[/quality_id]/segment_id`; identifiers are
/// validated upstream so no traversal sequences reach this point.
pub fn locate(
    cache_root: &Path,
    movie_id: &str,
    quality_id: Option<&str>,
    segment_id: &str,
) -> Option<PathBuf> {
    let segment_id = normalize_segment_id(segment_id)?;
    let movie_dir = cache_root.join(movie_id);

    let dir = match quality_id {
        Some(q) if !q.trim().is_empty() => movie_dir.join(q),
        // Master playlist lives at the movie level
        _ => movie_dir,
    };

    if !dir.is_dir() {
        return None;
    }

    let path = dir.join(segment_id);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_master_and_quality_segments() {
        let root = tempfile::tempdir().unwrap();
        let movie = root.path().join("m1");
        std::fs::create_dir_all(movie.join("720p")).unwrap();
        std::fs::write(movie.join("master.m3u8"), b"#EXTM3U").unwrap();
        std::fs::write(movie.join("720p/seg_0001.m4s"), b"data").unwrap();

        assert!(locate(root.path(), "m1", None, "master.m3u8").is_some());
        assert!(locate(root.path(), "m1", Some("720p"), "seg_0001.m4s").is_some());
        assert!(locate(root.path(), "m1", Some("720p"), "seg_0002.m4s").is_none());
        assert!(locate(root.path(), "m2", None, "master.m3u8").is_none());
        assert!(locate(root.path(), "m1", Some("1080p"), "seg_0001.m4s").is_none());
    }

    #[test]
    fn blank_segment_id_is_a_miss() {
        let root = tempfile::tempdir().unwrap();
        assert!(locate(root.path(), "m1", None, "   ").is_none());
    }
}
