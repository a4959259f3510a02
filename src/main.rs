//! Streamseed - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamseed::{
    api,
    config::Config,
    error::{AppError, Result},
    events::StreamEventHub,
    metrics,
    registry::{MemoryRegistry, RedisRegistry, RegistryStore},
    seeder::{maintenance, OriginFetcher, S3Origin, SeederService},
    signaling::{ConnectionTable, PeerMetricsService, SignalingService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamseed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting Streamseed");

    // The cache root must exist and be writable before anything serves;
    // disk trouble is a startup failure, not a per-request one.
    tokio::fs::create_dir_all(&config.cache_path).await?;
    let probe = config.cache_path.join(".startup-probe");
    tokio::fs::write(&probe, b"ok").await.map_err(|e| {
        AppError::Config(format!(
            "Cache root {} is not writable: {}",
            config.cache_path.display(),
            e
        ))
    })?;
    let _ = tokio::fs::remove_file(&probe).await;

    // Connect the shared peer registry
    let registry: Arc<dyn RegistryStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisRegistry::connect(url).await?;
            tracing::info!("Connected to Redis registry");
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process registry (single-node mode)");
            Arc::new(MemoryRegistry::new())
        }
    };

    // Origin fallback store
    let origin_store: Option<Arc<dyn streamseed::seeder::OriginStore>> =
        if config.origin_enabled && config.origin_bucket.is_some() {
            let origin = S3Origin::new(&config)?;
            tracing::info!(
                bucket = config.origin_bucket.as_deref().unwrap_or("-"),
                "Origin fallback enabled"
            );
            Some(Arc::new(origin))
        } else {
            tracing::info!("Origin fallback disabled");
            None
        };

    let origin = Arc::new(OriginFetcher::new(
        origin_store,
        config.cache_path.clone(),
        config.origin_object_prefix.clone(),
        config.media_extensions.clone(),
    ));

    // Wire up services
    let seeder = Arc::new(SeederService::new(
        registry.clone(),
        config.cache_path.clone(),
        config.segment_ttl,
        config.cache_window,
    ));
    let events = Arc::new(StreamEventHub::new(256));
    let peer_metrics = Arc::new(PeerMetricsService::new(
        registry.clone(),
        config.reliability_policy,
        config.reliability_ewma_alpha,
        config.peer_last_seen_ttl,
    ));
    let signaling = Arc::new(SignalingService::new(
        registry.clone(),
        peer_metrics,
        events.clone(),
        config.segment_ttl,
        config.peer_last_seen_ttl,
    ));
    let connections = Arc::new(ConnectionTable::new());

    // Initialize Prometheus metrics recorder
    let metrics_handle = metrics::init_metrics();
    tracing::info!("Prometheus metrics recorder initialized");

    // Re-announce pre-existing cache contents before serving requests
    maintenance::startup_announce(&seeder).await;

    // Spawn the periodic cache maintenance sweep
    maintenance::spawn(seeder.clone(), config.maintenance_interval);

    // Create application state
    let mut app_state = api::AppState::new(
        config.clone(),
        registry,
        seeder,
        origin,
        signaling,
        connections,
        events,
    );
    app_state.set_metrics_handle(metrics_handle);
    let state = Arc::new(app_state);

    // Build router
    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(axum::middleware::from_fn(metrics::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
