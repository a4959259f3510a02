//! Segment file serving: content types, cache policy, response assembly.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::Path;
use tokio::fs;

const ONE_HOUR_SECS: u64 = 3600;
const ONE_DAY_SECS: u64 = 86400;

/// Content type for a segment file, by extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".m4s") {
        "video/iso.segment"
    } else if name.ends_with(".mp4") {
        "video/mp4"
    } else if name.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if name.ends_with(".ts") || name.ends_with(".m2ts") {
        "video/mp2t"
    } else {
        "application/octet-stream"
    }
}

/// Cache-control policy, split in two tiers.
///
/// Init segments and playlists can legitimately change when a transcode
/// is re-run, so they get a short-but-nonzero max-age; media segments are
/// immutable once produced and cache for a day.
pub fn cache_control_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.starts_with("init.") || name.ends_with(".m3u8") {
        format!("public, max-age={}", ONE_HOUR_SECS)
    } else {
        format!("public, max-age={}", ONE_DAY_SECS)
    }
}

/// Serve a cached segment file.
///
/// Unreadable files answer 404, never a 5xx, so client retry/backoff can
/// treat "not yet available" uniformly.
pub async fn serve(path: &Path) -> Response {
    let body = match fs::read(path).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Segment exists but is not readable");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let content_length = body.len();

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(media_type_for(path)),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&content_length.to_string())
            .unwrap_or(HeaderValue::from_static("0")),
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control_for(path)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn media_types_by_extension() {
        assert_eq!(media_type_for(&PathBuf::from("seg.m4s")), "video/iso.segment");
        assert_eq!(media_type_for(&PathBuf::from("init.mp4")), "video/mp4");
        assert_eq!(
            media_type_for(&PathBuf::from("master.m3u8")),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(media_type_for(&PathBuf::from("old.ts")), "video/mp2t");
        assert_eq!(
            media_type_for(&PathBuf::from("blob.bin")),
            "application/octet-stream"
        );
    }

    #[test]
    fn cache_control_tiers() {
        assert_eq!(
            cache_control_for(&PathBuf::from("init.mp4")),
            "public, max-age=3600"
        );
        assert_eq!(
            cache_control_for(&PathBuf::from("playlist.m3u8")),
            "public, max-age=3600"
        );
        assert_eq!(
            cache_control_for(&PathBuf::from("seg_0001.m4s")),
            "public, max-age=86400"
        );
    }

    #[tokio::test]
    async fn missing_file_serves_404() {
        let response = serve(&PathBuf::from("/definitely/not/here.m4s")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
