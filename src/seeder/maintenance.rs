//! Cache maintenance: startup announce and the periodic sweep.
//!
//! The sweep is the only component that actively shrinks the cache;
//! nothing else deletes files. It runs on its own timer, independent of
//! request traffic, and tolerates interleaving with in-flight fetches (a
//! segment fetched moments earlier has a fresh mtime and is not
//! selected).

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use super::service::SeederService;
use crate::metrics;

/// One-shot boot pass: re-announce pre-existing cache contents before the
/// node starts serving. No eviction here.
pub async fn startup_announce(seeder: &SeederService) {
    let segments = seeder.scan_cache().await;
    tracing::info!(count = segments.len(), "Seeder discovered segments in local cache");
    if !segments.is_empty() {
        seeder.sync_to_registry(&segments).await;
    }
    tracing::info!("Seeder ready to serve peers");
}

/// Spawn the periodic maintenance loop.
pub fn spawn(seeder: Arc<SeederService>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        // First tick fires immediately; the startup pass already ran.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_tick(&seeder).await;
        }
    });
    tracing::info!(period_secs = period.as_secs(), "Cache maintenance scheduler started");
}

/// One maintenance tick: rescan, re-announce, evict, refresh.
pub async fn run_tick(seeder: &SeederService) {
    let segments = seeder.scan_cache().await;
    if !segments.is_empty() {
        seeder.sync_to_registry(&segments).await;
    }

    let expired = seeder.find_expired(&segments);
    let expired_count = expired.len();
    if !expired.is_empty() {
        seeder.purge_expired(&expired).await;
        metrics::record_evictions(expired_count as u64);
    }

    let live: Vec<_> = segments
        .iter()
        .filter(|s| !expired.iter().any(|e| std::ptr::eq(*e, *s)))
        .collect();
    if !live.is_empty() {
        seeder.refresh_ttl(&live).await;
    }

    tracing::debug!(
        segments = segments.len(),
        expired = expired_count,
        "Seeder maintenance tick complete"
    );
}
