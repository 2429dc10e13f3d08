//! Shared application state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use bracketeer_client::{CachedApi, TrueFinalsClient, TrueFinalsConfig};
use bracketeer_core::{AppConfig, CacheDb};

use crate::relay::EventRelay;
use crate::{routes, ws};

/// State handed to every route.
#[derive(Clone, Debug)]
pub struct AppState {
    pub api: CachedApi,
    pub relay: EventRelay,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(api: CachedApi, relay: EventRelay, config: AppConfig) -> Self {
        Self { api, relay, config: Arc::new(config) }
    }

    /// Open the store and wire the TrueFinals client from configuration.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let db = CacheDb::open(&config.db_path).await?;
        let client = TrueFinalsClient::new(TrueFinalsConfig::from_app_config(&config))?;
        let api = CachedApi::from_config(db.clone(), Arc::new(client), &config);
        let relay = EventRelay::new().with_client_store(db);
        Ok(Self::new(api, relay, config))
    }
}

/// Every HTTP and WebSocket route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/ws", get(ws::ws_handler))
        .route("/matches/upcoming.json", get(routes::upcoming_matches))
        .route("/matches/queue.json", get(routes::match_queue))
        .route("/matches/debug/raw", get(routes::debug_raw_matches))
        .route("/clients", get(routes::clients))
        .route("/debug/requests", get(routes::debug_requests))
        .route("/debug/rate-limit", get(routes::debug_rate_limit))
        .route("/admin/cache/purge", post(routes::purge_cache))
        .route("/setup/check-credentials", get(routes::check_credentials))
        .with_state(state)
}
