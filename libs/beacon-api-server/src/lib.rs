mod http;

use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use beacon_api::{HostEnvironment, ResourceTimingEntry};
use beacon_engine::BeaconSession;
use beacon_engine::config::CapabilitiesConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind api :{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("axum serve: {0}")]
    Serve(#[source] std::io::Error),
}

/// Host view of the collector: capabilities come from config, the resource
/// timeline is every beacon request the collector served.
///
/// Times are ms since the collector started.
pub struct RecordingHost {
    navigation_timing: bool,
    resource_timing: bool,
    started: Instant,
    entries: RwLock<Vec<ResourceTimingEntry>>,
}

impl RecordingHost {
    pub fn new(capabilities: &CapabilitiesConfig) -> Self {
        Self {
            navigation_timing: capabilities.navigation_timing,
            resource_timing: capabilities.resource_timing,
            started: Instant::now(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn record(&self, entry: ResourceTimingEntry) {
        match self.entries.write() {
            Ok(mut g) => g.push(entry),
            Err(poisoned) => {
                tracing::warn!("resource timeline lock was poisoned, recovering");
                poisoned.into_inner().push(entry);
            }
        }
    }
}

impl HostEnvironment for RecordingHost {
    fn navigation_timing_supported(&self) -> bool {
        self.navigation_timing
    }

    fn resource_timing_supported(&self) -> bool {
        self.resource_timing
    }

    fn resource_entries(&self) -> Vec<ResourceTimingEntry> {
        match self.entries.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => {
                tracing::warn!("resource timeline lock was poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }
}

#[derive(Clone)]
struct AppState {
    session: Arc<BeaconSession>,
    host: Arc<RecordingHost>,
}

/// Collector routes. `host` must be the host the session was built with.
pub fn router(session: Arc<BeaconSession>, host: Arc<RecordingHost>) -> Router {
    let beacon_url = session.config().beacon_url.clone();
    let state = AppState { session, host };

    Router::new()
        .route(
            &beacon_url,
            get(http::handle_beacon_get).post(http::handle_beacon_post),
        )
        .route("/api/events/{event}", post(http::handle_event))
        .route("/api/beacons", get(http::handle_list_beacons))
        .route("/api/beacons/count", get(http::handle_count))
        .route("/api/beacons/last", get(http::handle_last))
        .route("/api/beacons/find", get(http::handle_find))
        .route("/api/validate/early/{pid}", get(http::handle_validate_early))
        .with_state(state)
}

/// Beacon collector HTTP server.
pub async fn run(
    session: Arc<BeaconSession>,
    host: Arc<RecordingHost>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let port = session.config().api_port;
    let beacon_url = session.config().beacon_url.clone();
    session.init();

    let app = router(session, host);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| ServerError::Bind { port, source })?;
    tracing::info!(port, beacon_url = %beacon_url, "beacon collector listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("beacon collector stopped");
    Ok(())
}
