//! API module - HTTP handlers and shared state.

pub mod handlers;
pub mod routes;

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::Config;
use crate::events::StreamEventHub;
use crate::registry::RegistryStore;
use crate::seeder::{OriginFetcher, SeederService};
use crate::signaling::{ConnectionTable, SignalingService};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub registry: Arc<dyn RegistryStore>,
    pub seeder: Arc<SeederService>,
    pub origin: Arc<OriginFetcher>,
    pub signaling: Arc<SignalingService>,
    pub connections: Arc<ConnectionTable>,
    pub events: Arc<StreamEventHub>,
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: Arc<dyn RegistryStore>,
        seeder: Arc<SeederService>,
        origin: Arc<OriginFetcher>,
        signaling: Arc<SignalingService>,
        connections: Arc<ConnectionTable>,
        events: Arc<StreamEventHub>,
    ) -> Self {
        Self {
            config,
            registry,
            seeder,
            origin,
            signaling,
            connections,
            events,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle for rendering /metrics output.
    pub fn set_metrics_handle(&mut self, handle: PrometheusHandle) {
        self.metrics_handle = Some(Arc::new(handle));
    }
}

pub type SharedState = Arc<AppState>;
