//! Origin fallback fetcher.
//!
//! On a cache miss the origin blob store is probed for the object and,
//! when present, the body is written through to the local cache. Origin
//! I/O errors are soft misses: logged, never fatal to the serving path.

use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::path::PathBuf;

use super::validate::{is_safe_identifier, is_valid_movie_id, normalize_segment_id};
use super::writer;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::model::{CachedSegment, SegmentType};

/// Origin blob store: `None` means the object does not exist.
#[async_trait]
pub trait OriginStore: Send + Sync {
    async fn fetch_object(&self, object_name: &str) -> Result<Option<Bytes>>;
}

/// S3-compatible origin (AWS S3, MinIO, ...).
pub struct S3Origin {
    bucket: Box<Bucket>,
}

impl S3Origin {
    /// Create an origin client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let bucket_name = config
            .origin_bucket
            .as_deref()
            .ok_or_else(|| AppError::Config("ORIGIN_BUCKET not set".into()))?;

        let credentials = Credentials::default()
            .map_err(|e| AppError::Config(format!("Failed to load origin credentials: {}", e)))?;

        let region = match &config.origin_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.origin_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config.origin_region.parse().map_err(|_| {
                AppError::Config(format!("Invalid origin region: {}", config.origin_region))
            })?,
        };

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| AppError::Config(format!("Failed to create origin bucket: {}", e)))?;

        // Path-style access for MinIO compatibility
        let bucket = if config.origin_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self { bucket })
    }
}

#[async_trait]
impl OriginStore for S3Origin {
    async fn fetch_object(&self, object_name: &str) -> Result<Option<Bytes>> {
        match self.bucket.get_object(object_name).await {
            Ok(response) => Ok(Some(Bytes::from(response.to_vec()))),
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("404") || err_str.contains("NoSuchKey") {
                    Ok(None)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to get object '{}': {}",
                        object_name, e
                    )))
                }
            }
        }
    }
}

/// Cache-miss fetcher: probes the origin for a segment and writes it
/// through to the local cache.
pub struct OriginFetcher {
    store: Option<std::sync::Arc<dyn OriginStore>>,
    cache_root: PathBuf,
    object_prefix: String,
    media_extensions: Vec<String>,
}

impl OriginFetcher {
    pub fn new(
        store: Option<std::sync::Arc<dyn OriginStore>>,
        cache_root: PathBuf,
        object_prefix: String,
        media_extensions: Vec<String>,
    ) -> Self {
        Self {
            store,
            cache_root,
            object_prefix,
            media_extensions,
        }
    }

    /// Whether an origin store is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Probe the origin for a segment and cache it locally.
    ///
    /// Returns `None` when the origin is disabled, the identifiers are
    /// unusable, the object is absent under every candidate filename, or
    /// the origin errored (soft miss).
    pub async fn fetch_from_origin(
        &self,
        movie_id: &str,
        quality_id: Option<&str>,
        segment_id: &str,
    ) -> Option<CachedSegment> {
        let store = self.store.as_ref()?;

        if !is_valid_movie_id(movie_id) {
            tracing::debug!(movie_id = %movie_id, "Invalid movie id for origin fetch");
            return None;
        }
        let segment_id = normalize_segment_id(segment_id)?;
        if !is_safe_identifier(segment_id) {
            tracing::debug!(segment_id = %segment_id, "Invalid segment id for origin fetch");
            return None;
        }

        let kind = SegmentType::from_segment_id(segment_id);

        for extension in self.extensions_for(kind) {
            // The segment id is normally the complete filename; extensions
            // are appended only for extensionless init/playlist requests.
            let file_name = if segment_id.ends_with(&format!(".{}", extension)) {
                segment_id.to_string()
            } else {
                format!("{}.{}", segment_id, extension)
            };
            let object_name = self.object_name(movie_id, quality_id, &file_name, kind);

            match store.fetch_object(&object_name).await {
                Ok(Some(body)) => {
                    match writer::save_to_cache(
                        &self.cache_root,
                        movie_id,
                        quality_id,
                        &file_name,
                        kind,
                        body,
                    )
                    .await
                    {
                        Ok(segment) => {
                            tracing::info!(
                                movie_id = %movie_id,
                                quality_id = quality_id.unwrap_or("-"),
                                segment_id = %file_name,
                                object = %object_name,
                                "Fetched segment from origin"
                            );
                            return Some(segment);
                        }
                        Err(e) => {
                            tracing::warn!(object = %object_name, error = %e, "Failed to cache fetched segment");
                            return None;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!(object = %object_name, "Segment not found at origin");
                }
                Err(e) => {
                    tracing::warn!(object = %object_name, error = %e, "Origin fetch failed");
                }
            }
        }

        None
    }

    /// Extension candidates tried for each segment type.
    fn extensions_for(&self, kind: SegmentType) -> Vec<String> {
        match kind {
            SegmentType::Init => vec!["mp4".into(), "m4s".into()],
            SegmentType::MasterPlaylist | SegmentType::VariantPlaylist => vec!["m3u8".into()],
            SegmentType::Media => self.media_extensions.clone(),
        }
    }

    /// Object key: `prefix/movieId[/qualityId]/fileName`, master playlists
    /// at the movie level.
    fn object_name(
        &self,
        movie_id: &str,
        quality_id: Option<&str>,
        file_name: &str,
        kind: SegmentType,
    ) -> String {
        let base = if self.object_prefix.trim().is_empty() {
            String::new()
        } else {
            format!("{}/", self.object_prefix.trim_end_matches('/'))
        };

        match quality_id {
            Some(q) if kind != SegmentType::MasterPlaylist && !q.trim().is_empty() => {
                format!("{}{}/{}/{}", base, movie_id, q, file_name)
            }
            _ => format!("{}{}/{}", base, movie_id, file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> OriginFetcher {
        OriginFetcher::new(
            None,
            PathBuf::from("cache"),
            "movies".into(),
            vec!["m4s".into(), "mp4".into()],
        )
    }

    #[test]
    fn object_names() {
        let f = fetcher();
        assert_eq!(
            f.object_name("m1", None, "master.m3u8", SegmentType::MasterPlaylist),
            "movies/m1/master.m3u8"
        );
        assert_eq!(
            f.object_name("m1", Some("720p"), "seg_0001.m4s", SegmentType::Media),
            "movies/m1/720p/seg_0001.m4s"
        );
        assert_eq!(
            f.object_name("m1", Some("720p"), "master.m3u8", SegmentType::MasterPlaylist),
            "movies/m1/master.m3u8"
        );
    }

    #[test]
    fn prefix_trailing_slashes_are_trimmed() {
        let f = OriginFetcher::new(
            None,
            PathBuf::from("cache"),
            "movies///".into(),
            vec!["m4s".into()],
        );
        assert_eq!(
            f.object_name("m1", Some("720p"), "init.mp4", SegmentType::Init),
            "movies/m1/720p/init.mp4"
        );
    }

    #[test]
    fn empty_prefix_builds_bare_paths() {
        let f = OriginFetcher::new(None, PathBuf::from("cache"), "".into(), vec!["m4s".into()]);
        assert_eq!(
            f.object_name("m1", Some("720p"), "seg.m4s", SegmentType::Media),
            "m1/720p/seg.m4s"
        );
    }

    #[test]
    fn extension_candidates_by_type() {
        let f = fetcher();
        assert_eq!(f.extensions_for(SegmentType::Init), vec!["mp4", "m4s"]);
        assert_eq!(f.extensions_for(SegmentType::VariantPlaylist), vec!["m3u8"]);
        assert_eq!(f.extensions_for(SegmentType::Media), vec!["m4s", "mp4"]);
    }

    #[tokio::test]
    async fn disabled_origin_is_a_miss() {
        let f = fetcher();
        assert!(f.fetch_from_origin("m1", Some("720p"), "seg.m4s").await.is_none());
    }
}
