//! Write-through cache writes.

use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::model::{CachedSegment, SegmentType};

/// Write a fetched segment into the cache tree and return its record.
///
/// Parent directories are created as needed; the write instant becomes
/// the file's freshness marker. Master playlists land at the movie level,
/// every other kind requires a quality directory.
pub async fn save_to_cache(
    cache_root: &Path,
    movie_id: &str,
    quality_id: Option<&str>,
    file_name: &str,
    kind: SegmentType,
    body: Bytes,
) -> Result<CachedSegment> {
    let dir = target_dir(cache_root, movie_id, quality_id, kind)?;
    fs::create_dir_all(&dir).await?;

    let target = dir.join(file_name);
    let mut file = fs::File::create(&target).await?;
    file.write_all(&body).await?;
    file.sync_all().await?;

    let now = Utc::now();
    tracing::info!(
        movie_id = %movie_id,
        quality_id = quality_id.unwrap_or("-"),
        segment_id = %file_name,
        path = %target.display(),
        size = body.len(),
        "Saved segment to cache"
    );

    Ok(CachedSegment {
        movie_id: movie_id.to_string(),
        quality_id: quality_id.map(str::to_string),
        segment_id: file_name.to_string(),
        path: target,
        last_modified: now,
        kind,
    })
}

fn target_dir(
    cache_root: &Path,
    movie_id: &str,
    quality_id: Option<&str>,
    kind: SegmentType,
) -> Result<PathBuf> {
    let movie_dir = cache_root.join(movie_id);

    if kind == SegmentType::MasterPlaylist {
        return Ok(movie_dir);
    }

    match quality_id {
        Some(q) if !q.trim().is_empty() => Ok(movie_dir.join(q)),
        _ => Err(AppError::Validation(format!(
            "Quality id is required for non-master segment type {:?}",
            kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_master_at_movie_level() {
        let root = tempfile::tempdir().unwrap();
        let segment = save_to_cache(
            root.path(),
            "m1",
            None,
            "master.m3u8",
            SegmentType::MasterPlaylist,
            Bytes::from_static(b"#EXTM3U"),
        )
        .await
        .unwrap();

        assert_eq!(segment.path, root.path().join("m1/master.m3u8"));
        assert_eq!(std::fs::read(&segment.path).unwrap(), b"#EXTM3U");
    }

    #[tokio::test]
    async fn writes_media_under_quality_dir() {
        let root = tempfile::tempdir().unwrap();
        let segment = save_to_cache(
            root.path(),
            "m1",
            Some("720p"),
            "seg_0001.m4s",
            SegmentType::Media,
            Bytes::from_static(b"data"),
        )
        .await
        .unwrap();

        assert_eq!(segment.path, root.path().join("m1/720p/seg_0001.m4s"));
        assert_eq!(segment.quality_id.as_deref(), Some("720p"));
    }

    #[tokio::test]
    async fn media_without_quality_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let result = save_to_cache(
            root.path(),
            "m1",
            None,
            "seg_0001.m4s",
            SegmentType::Media,
            Bytes::from_static(b"data"),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
