//! Shared test fixtures: tempdir-backed cache, in-process registry, and a
//! counting stub origin.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use streamseed::api::{AppState, SharedState};
use streamseed::config::{Config, ReliabilityPolicy};
use streamseed::error::Result;
use streamseed::events::StreamEventHub;
use streamseed::registry::{MemoryRegistry, RegistryStore};
use streamseed::seeder::{OriginFetcher, OriginStore, SeederService};
use streamseed::signaling::{ConnectionTable, PeerMetricsService, SignalingService};

/// Stub origin store that records how many times each object was fetched.
#[derive(Default)]
pub struct CountingOrigin {
    objects: Mutex<HashMap<String, Bytes>>,
    fetches: AtomicUsize,
}

impl CountingOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object_name: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(object_name.to_string(), Bytes::copy_from_slice(body));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginStore for CountingOrigin {
    async fn fetch_object(&self, object_name: &str) -> Result<Option<Bytes>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(object_name).cloned())
    }
}

pub fn test_config(cache_path: PathBuf) -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        cache_path,
        redis_url: None,
        segment_ttl: Duration::from_secs(90),
        peer_last_seen_ttl: Duration::from_secs(180),
        maintenance_interval: Duration::from_secs(30),
        cache_window: Duration::from_secs(240),
        origin_enabled: true,
        origin_bucket: None,
        origin_region: "us-east-1".into(),
        origin_endpoint: None,
        origin_object_prefix: "movies".into(),
        media_extensions: vec!["m4s".into(), "mp4".into()],
        reliability_policy: ReliabilityPolicy::Cumulative,
        reliability_ewma_alpha: 0.2,
    }
}

/// Everything a test needs to drive the service end to end.
pub struct TestContext {
    pub state: SharedState,
    pub registry: Arc<MemoryRegistry>,
    pub origin: Arc<CountingOrigin>,
    pub cache_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config_tweak(|_| {})
    }

    pub fn with_config_tweak(tweak: impl FnOnce(&mut Config)) -> Self {
        let cache_dir = TempDir::new().expect("failed to create cache dir");
        let mut config = test_config(cache_dir.path().to_path_buf());
        tweak(&mut config);

        let registry = Arc::new(MemoryRegistry::new());
        let registry_dyn: Arc<dyn RegistryStore> = registry.clone();

        let origin = Arc::new(CountingOrigin::new());
        let origin_fetcher = Arc::new(OriginFetcher::new(
            Some(origin.clone() as Arc<dyn OriginStore>),
            config.cache_path.clone(),
            config.origin_object_prefix.clone(),
            config.media_extensions.clone(),
        ));

        let seeder = Arc::new(SeederService::new(
            registry_dyn.clone(),
            config.cache_path.clone(),
            config.segment_ttl,
            config.cache_window,
        ));
        let events = Arc::new(StreamEventHub::new(64));
        let peer_metrics = Arc::new(PeerMetricsService::new(
            registry_dyn.clone(),
            config.reliability_policy,
            config.reliability_ewma_alpha,
            config.peer_last_seen_ttl,
        ));
        let signaling = Arc::new(SignalingService::new(
            registry_dyn.clone(),
            peer_metrics,
            events.clone(),
            config.segment_ttl,
            config.peer_last_seen_ttl,
        ));
        let connections = Arc::new(ConnectionTable::new());

        let state = Arc::new(AppState::new(
            config,
            registry_dyn,
            seeder,
            origin_fetcher,
            signaling,
            connections,
            events,
        ));

        Self {
            state,
            registry,
            origin,
            cache_dir,
        }
    }

    /// Write a segment file into the cache tree.
    pub fn write_cached(&self, movie_id: &str, quality_id: Option<&str>, file_name: &str, body: &[u8]) {
        let mut dir = self.cache_dir.path().join(movie_id);
        if let Some(q) = quality_id {
            dir = dir.join(q);
        }
        std::fs::create_dir_all(&dir).expect("failed to create cache dirs");
        std::fs::write(dir.join(file_name), body).expect("failed to write segment");
    }
}
