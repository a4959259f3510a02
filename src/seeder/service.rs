//! Seeder registry synchronization and cache eviction.

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use super::scanner;
use crate::model::CachedSegment;
use crate::registry::{keys, RegistryStore};

/// Owns the cache tree's registry announcements and its eviction policy.
pub struct SeederService {
    registry: Arc<dyn RegistryStore>,
    cache_root: PathBuf,
    segment_ttl: Duration,
    cache_window: Duration,
}

impl SeederService {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        cache_root: PathBuf,
        segment_ttl: Duration,
        cache_window: Duration,
    ) -> Self {
        Self {
            registry,
            cache_root,
            segment_ttl,
            cache_window,
        }
    }

    /// Walk the on-disk tree once and classify every file.
    pub async fn scan_cache(&self) -> Vec<CachedSegment> {
        scanner::scan(&self.cache_root).await
    }

    /// Announce cached segments into the shared registry.
    ///
    /// Segments are grouped per movie/quality key; critical segments are
    /// persisted (losing them would break playback bootstrap), media keys
    /// get the TTL re-applied. Registry failures are logged and skipped:
    /// the next maintenance tick self-heals.
    pub async fn sync_to_registry(&self, segments: &[CachedSegment]) {
        let mut registered: HashMap<String, usize> = HashMap::new();

        for segment in segments {
            let key = keys::movie_quality_segments(&segment.movie_id, segment.quality_id.as_deref());

            if let Err(e) = self.registry.set_add(&key, &segment.segment_id).await {
                tracing::warn!(key = %key, error = %e, "Failed to register segment");
                continue;
            }

            let result = if segment.is_critical() {
                self.registry.persist(&key).await
            } else {
                self.registry.expire(&key, self.segment_ttl).await
            };
            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "Failed to update TTL for segment key");
            }

            *registered.entry(segment.movie_id.clone()).or_default() += 1;
        }

        for (movie_id, count) in registered {
            tracing::info!(movie_id = %movie_id, count, "Registered segments in registry");
        }
    }

    /// Announce a single segment fetched from the origin: this node now
    /// holds it and can act as a seed of last resort.
    pub async fn register_fetched(&self, segment: &CachedSegment) {
        self.sync_to_registry(std::slice::from_ref(segment)).await;
    }

    /// Non-critical segments whose mtime fell out of the cache window.
    /// Critical segments are never selected regardless of age.
    pub fn find_expired<'a>(&self, segments: &'a [CachedSegment]) -> Vec<&'a CachedSegment> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.cache_window).unwrap_or_else(|_| chrono::Duration::zero());
        segments
            .iter()
            .filter(|s| !s.is_critical())
            .filter(|s| s.last_modified < cutoff)
            .collect()
    }

    /// Delete expired segments from disk and retract them from the
    /// registry. Idempotent: already-missing files are fine, and the
    /// registry entry is removed either way.
    pub async fn purge_expired(&self, segments: &[&CachedSegment]) {
        for segment in segments {
            if segment.is_critical() {
                tracing::warn!(segment_id = %segment.segment_id, "Refusing to purge critical segment");
                continue;
            }

            match fs::remove_file(&segment.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %segment.path.display(), "File already absent when purging");
                }
                Err(e) => {
                    tracing::debug!(path = %segment.path.display(), error = %e, "Failed to delete file");
                }
            }

            let key = keys::movie_quality_segments(&segment.movie_id, segment.quality_id.as_deref());
            match self.registry.set_remove(&key, &segment.segment_id).await {
                Ok(removed) => {
                    tracing::info!(
                        movie_id = %segment.movie_id,
                        segment_id = %segment.segment_id,
                        removed,
                        "Purged expired media segment"
                    );
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to retract purged segment");
                }
            }
        }
    }

    /// Re-apply the TTL to each distinct non-critical segments key that
    /// still holds live segments, so a watched title's discovery entries
    /// never lapse purely on TTL timing between sweeps.
    pub async fn refresh_ttl(&self, live_segments: &[&CachedSegment]) {
        let mut refreshed: Vec<String> = Vec::new();

        for segment in live_segments {
            if segment.is_critical() {
                // Critical keys are persisted; nothing to refresh.
                continue;
            }
            let key = keys::movie_quality_segments(&segment.movie_id, segment.quality_id.as_deref());
            if refreshed.contains(&key) {
                continue;
            }
            match self.registry.expire(&key, self.segment_ttl).await {
                Ok(true) => refreshed.push(key),
                Ok(false) => {
                    tracing::debug!(key = %key, "TTL refresh skipped, key absent");
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to refresh TTL");
                }
            }
        }
    }
}
