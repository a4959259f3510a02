//! Cache directory scanner.
//!
//! Walks the on-disk tree once and classifies every file. Expected
//! structure:
//!
//! ```text
//! cache/
//!   {movieId}/
//!     master.m3u8              (master playlist, optional)
//!     {quality}/
//!       init.mp4 or init.m4s   (init segment)
//!       playlist.m3u8          (variant playlist)
//!       seg_0001.m4s           (media segments)
//! ```

use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs;

use crate::model::{CachedSegment, SegmentType};

/// Scan the cache root, returning every classified segment.
///
/// A missing cache root is an empty scan; I/O errors on individual
/// entries are logged and skipped.
pub async fn scan(cache_root: &Path) -> Vec<CachedSegment> {
    let mut segments = Vec::new();

    let mut movie_dirs = match fs::read_dir(cache_root).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %cache_root.display(), error = %e, "Cache root not readable yet");
            return segments;
        }
    };

    while let Ok(Some(movie_entry)) = movie_dirs.next_entry().await.map_err(log_walk_error) {
        let movie_path = movie_entry.path();
        if !movie_path.is_dir() {
            continue;
        }
        let movie_id = movie_entry.file_name().to_string_lossy().to_string();
        scan_movie_dir(&movie_path, &movie_id, &mut segments).await;
    }

    tracing::debug!(count = segments.len(), path = %cache_root.display(), "Cache scan complete");
    segments
}

async fn scan_movie_dir(movie_path: &Path, movie_id: &str, segments: &mut Vec<CachedSegment>) {
    let mut entries = match fs::read_dir(movie_path).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %movie_path.display(), error = %e, "Failed to scan movie directory");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await.map_err(log_walk_error) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if path.is_dir() {
            scan_quality_dir(&path, movie_id, &name, segments).await;
        } else if path.is_file() {
            // Movie-level files: only playlists are expected here
            let kind = SegmentType::from_segment_id(&name);
            if matches!(
                kind,
                SegmentType::MasterPlaylist | SegmentType::VariantPlaylist
            ) {
                if let Some(segment) =
                    build_segment(movie_id, None, &name, &path, SegmentType::MasterPlaylist).await
                {
                    segments.push(segment);
                }
            }
        }
    }
}

async fn scan_quality_dir(
    quality_path: &Path,
    movie_id: &str,
    quality_id: &str,
    segments: &mut Vec<CachedSegment>,
) {
    let mut entries = match fs::read_dir(quality_path).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %quality_path.display(), error = %e, "Failed to scan quality directory");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await.map_err(log_walk_error) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = SegmentType::from_segment_id(&name);
        if let Some(segment) = build_segment(movie_id, Some(quality_id), &name, &path, kind).await {
            segments.push(segment);
        }
    }
}

async fn build_segment(
    movie_id: &str,
    quality_id: Option<&str>,
    segment_id: &str,
    path: &Path,
    kind: SegmentType,
) -> Option<CachedSegment> {
    let last_modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(mtime) => DateTime::<Utc>::from(mtime),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Failed to read file attributes");
            Utc::now()
        }
    };

    Some(CachedSegment {
        movie_id: movie_id.to_string(),
        quality_id: quality_id.map(str::to_string),
        segment_id: segment_id.to_string(),
        path: path.to_path_buf(),
        last_modified,
        kind,
    })
}

fn log_walk_error(e: std::io::Error) -> std::io::Error {
    tracing::debug!(error = %e, "Cache walk entry error");
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifies_whole_tree() {
        let root = tempfile::tempdir().unwrap();
        let movie = root.path().join("m1");
        std::fs::create_dir_all(movie.join("720p")).unwrap();
        std::fs::write(movie.join("master.m3u8"), b"#EXTM3U").unwrap();
        std::fs::write(movie.join("720p/init.mp4"), b"init").unwrap();
        std::fs::write(movie.join("720p/playlist.m3u8"), b"#EXTM3U").unwrap();
        std::fs::write(movie.join("720p/seg_0001.m4s"), b"data").unwrap();

        let mut segments = scan(root.path()).await;
        segments.sort_by(|a, b| a.segment_id.cmp(&b.segment_id));
        assert_eq!(segments.len(), 4);

        let master = segments.iter().find(|s| s.segment_id == "master.m3u8").unwrap();
        assert_eq!(master.kind, SegmentType::MasterPlaylist);
        assert!(master.quality_id.is_none());

        let init = segments.iter().find(|s| s.segment_id == "init.mp4").unwrap();
        assert_eq!(init.kind, SegmentType::Init);
        assert_eq!(init.quality_id.as_deref(), Some("720p"));

        let media = segments.iter().find(|s| s.segment_id == "seg_0001.m4s").unwrap();
        assert_eq!(media.kind, SegmentType::Media);
    }

    #[tokio::test]
    async fn missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert!(scan(&missing).await.is_empty());
    }
}
