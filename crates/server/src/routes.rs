//! JSON route handlers.

use axum::Json;
use axum::extract::{Query, State};
use bracketeer_client::{MatchQueue, MatchView, StateSummary, match_queue as build_match_queue, state_summary};
use bracketeer_core::{CacheEntry, ClientRecord, PurgeStats};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::app::AppState;
use crate::error::ServerError;
use crate::relay::ConnectionSnapshot;
use crate::tools::credentials::{CredentialStatus, verify_configured};
use crate::tools::rate_limit::RateLimitStatus;

/// Rows returned by the request-history route.
const DEBUG_REQUEST_LIMIT: usize = 100;

/// Recorded clients returned by the clients route.
const CLIENT_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    /// Purge the request cache before reading; `0` and `false` count as unset.
    #[serde(default)]
    pub refresh: Option<String>,
}

impl RefreshParams {
    fn requested(&self) -> bool {
        self.refresh
            .as_deref()
            .is_some_and(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeParams {
    pub max_age: Option<u64>,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "event_name": state.config.event_name,
        "cages": state.config.cages,
        "connections": state.relay.connection_count().await,
    }))
}

async fn current_queue(state: &AppState, params: &RefreshParams) -> Result<MatchQueue, ServerError> {
    if params.requested() {
        state.api.force_refresh().await?;
    }
    Ok(build_match_queue(&state.api, &state.config.tournaments).await?)
}

/// Flat queue: active, then on deck, then upcoming.
pub async fn upcoming_matches(
    State(state): State<AppState>, Query(params): Query<RefreshParams>,
) -> Result<Json<Vec<MatchView>>, ServerError> {
    Ok(Json(current_queue(&state, &params).await?.into_all()))
}

/// Queue grouped by stage, with counts.
pub async fn match_queue(
    State(state): State<AppState>, Query(params): Query<RefreshParams>,
) -> Result<Json<MatchQueue>, ServerError> {
    Ok(Json(current_queue(&state, &params).await?))
}

/// Unfiltered match counts by state.
pub async fn debug_raw_matches(State(state): State<AppState>) -> Result<Json<StateSummary>, ServerError> {
    Ok(Json(state_summary(&state.api, &state.config.tournaments).await?))
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub connections: Vec<ConnectionSnapshot>,
    pub recorded: Vec<ClientRecord>,
}

/// Live relay connections and recorded presence announcements.
pub async fn clients(State(state): State<AppState>) -> Result<Json<ClientsResponse>, ServerError> {
    let connections = state.relay.snapshot().await;
    let recorded = state.api.db().list_clients(CLIENT_LIST_LIMIT).await?;
    Ok(Json(ClientsResponse { connections, recorded }))
}

/// Newest request-history rows.
pub async fn debug_requests(State(state): State<AppState>) -> Result<Json<Vec<CacheEntry>>, ServerError> {
    Ok(Json(state.api.db().recent_requests(DEBUG_REQUEST_LIMIT).await?))
}

pub async fn debug_rate_limit(State(state): State<AppState>) -> Result<Json<RateLimitStatus>, ServerError> {
    Ok(Json(RateLimitStatus::collect(&state.api).await?))
}

/// Destructive purge. Defaults to the configured maximum age.
pub async fn purge_cache(
    State(state): State<AppState>, Query(params): Query<PurgeParams>,
) -> Result<Json<PurgeStats>, ServerError> {
    let max_age = params.max_age.unwrap_or(state.config.purge_max_age_secs);
    tracing::warn!(max_age, "cache purge requested");
    Ok(Json(state.api.purge(max_age).await?))
}

/// Try the configured credentials, and the swapped pair after a 401.
pub async fn check_credentials(State(state): State<AppState>) -> Result<Json<CredentialStatus>, ServerError> {
    Ok(Json(verify_configured(&state.config).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::app::router;
    use crate::relay::EventRelay;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use bracketeer_client::{CachedApi, Upstream, UpstreamError, UpstreamResponse};
    use bracketeer_core::{AppConfig, CacheDb, ManualClock, RateLimitPolicy, TournamentKey};
    use tower::ServiceExt;

    /// Answers games and details for every tournament.
    struct FixedUpstream;

    #[async_trait]
    impl Upstream for FixedUpstream {
        async fn get(&self, endpoint_path: &str) -> Result<UpstreamResponse, UpstreamError> {
            let body = if endpoint_path.ends_with("/games") {
                json!([
                    {"id": "g1", "name": "M1", "state": "active", "calledSince": 10, "slots": []},
                    {"id": "g2", "name": "M2", "state": "available", "slots": []},
                    {"id": "g3", "name": "M3", "state": "done", "slots": []},
                ])
            } else if endpoint_path.ends_with("/details") {
                json!({"title": "Beetles"})
            } else {
                json!([])
            };
            Ok(UpstreamResponse::new(200, body))
        }
    }

    async fn state() -> (AppState, Arc<ManualClock>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let api = CachedApi::new(db.clone(), Arc::new(FixedUpstream)).with_clock(clock.clone());
        let config = AppConfig {
            tournaments: vec![TournamentKey { id: "T1".into(), weightclass: None, tourn_type: "truefinals".into() }],
            ..AppConfig::default()
        };
        (AppState::new(api, EventRelay::new().with_client_store(db), config), clock)
    }

    /// Counts every call made through it.
    #[derive(Default)]
    struct CountingUpstream {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for CountingUpstream {
        async fn get(&self, endpoint_path: &str) -> Result<UpstreamResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FixedUpstream.get(endpoint_path).await
        }
    }

    async fn enforced_state() -> (AppState, Arc<ManualClock>, Arc<CountingUpstream>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let upstream = Arc::new(CountingUpstream::default());
        let api = CachedApi::new(db.clone(), upstream.clone())
            .with_clock(clock.clone())
            .with_policy(RateLimitPolicy::Enforce);
        let tournaments = ["T1", "T2", "T3"]
            .iter()
            .map(|id| TournamentKey { id: (*id).into(), weightclass: None, tourn_type: "truefinals".into() })
            .collect();
        let config = AppConfig { tournaments, rate_limit_policy: RateLimitPolicy::Enforce, ..AppConfig::default() };
        (AppState::new(api, EventRelay::new().with_client_store(db), config), clock, upstream)
    }

    async fn send(state: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        send(state, "GET", uri).await
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _clock) = state().await;
        let (status, body) = get_json(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upcoming_is_flat_and_filtered() {
        let (state, _clock) = state().await;
        let (status, body) = get_json(state, "/matches/upcoming.json").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["M1", "M2"]);
        assert_eq!(body[0]["tournament_display_name"], "Beetles");
    }

    #[tokio::test]
    async fn test_queue_grouped() {
        let (state, _clock) = state().await;
        let (_, body) = get_json(state, "/matches/queue.json").await;
        assert_eq!(body["active_count"], 1);
        assert_eq!(body["upcoming_count"], 1);
        assert_eq!(body["on_deck_count"], 0);
    }

    #[tokio::test]
    async fn test_refresh_purges_before_reading() {
        let (state, clock) = state().await;
        get_json(state.clone(), "/matches/queue.json").await;
        let before = state.api.db().recent_requests(100).await.unwrap().len();

        clock.advance(1.0);
        get_json(state.clone(), "/matches/queue.json?refresh=1").await;

        let after = state.api.db().recent_requests(100).await.unwrap();
        assert_eq!(after.len(), before);
        assert!(after.iter().all(|row| row.last_requested > 1_700_000_000.0));
    }

    #[tokio::test]
    async fn test_refresh_cannot_reset_enforced_budget() {
        let (state, clock, upstream) = enforced_state().await;
        let (status, _) = get_json(state.clone(), "/matches/queue.json?refresh=1").await;
        assert_eq!(status, StatusCode::OK);
        let after_first = upstream.calls.load(Ordering::SeqCst);
        assert_eq!(after_first, 6);
        assert!(state.api.rate_limited().await.unwrap());

        for _ in 0..4 {
            clock.advance(0.5);
            let (status, body) = get_json(state.clone(), "/matches/queue.json?refresh=1").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["active_count"], 3);
        }
        assert_eq!(upstream.calls.load(Ordering::SeqCst), after_first);
    }

    #[tokio::test]
    async fn test_debug_raw_counts_all_states() {
        let (state, _clock) = state().await;
        let (_, body) = get_json(state, "/matches/debug/raw").await;
        assert_eq!(body["total_matches"], 3);
        assert_eq!(body["state_summary"]["done"], 1);
    }

    #[tokio::test]
    async fn test_debug_requests_and_rate_limit() {
        let (state, _clock) = state().await;
        get_json(state.clone(), "/matches/upcoming.json").await;

        let (_, requests) = get_json(state.clone(), "/debug/requests").await;
        assert!(!requests.as_array().unwrap().is_empty());

        let (_, status) = get_json(state, "/debug/rate-limit").await;
        assert_eq!(status["max_requests"], 5);
        assert_eq!(status["policy"], "advisory");
    }

    #[tokio::test]
    async fn test_purge_route() {
        let (state, clock) = state().await;
        get_json(state.clone(), "/matches/upcoming.json").await;
        clock.advance(1.0);

        let (status, stats) = send(state.clone(), "POST", "/admin/cache/purge?max_age=0").await;
        assert_eq!(status, StatusCode::OK);
        assert!(stats["aged_deleted"].as_u64().unwrap() > 0);

        let (_, requests) = get_json(state, "/debug/requests").await;
        assert!(requests.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_credentials_unconfigured() {
        let (state, _clock) = state().await;
        let (status, body) = get_json(state, "/setup/check-credentials").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("truefinals_user_id"));
    }

    #[tokio::test]
    async fn test_clients_lists_connections() {
        let (state, _clock) = state().await;
        let _conn = state.relay.connect().await;
        let (_, body) = get_json(state, "/clients").await;
        assert_eq!(body["connections"].as_array().unwrap().len(), 1);
        assert!(body["recorded"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_flag() {
        assert!(RefreshParams { refresh: Some("1".into()) }.requested());
        assert!(RefreshParams { refresh: Some("true".into()) }.requested());
        assert!(!RefreshParams { refresh: Some("0".into()) }.requested());
        assert!(!RefreshParams::default().requested());
    }
}
