//! Named TrueFinals endpoints with their freshness windows.

use bracketeer_core::{CacheEntry, Error};
use serde_json::Value;

use super::{CachedApi, ExpiryClass};

/// Array body of a usable response, or empty.
///
/// Error answers (4xx) and non-array bodies both yield an empty list.
pub(crate) fn list_body(entry: Option<&CacheEntry>) -> Vec<Value> {
    match entry {
        Some(entry) if entry.is_ok_response() => entry.response_body.as_array().cloned().unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Object body of a usable response.
pub(crate) fn object_body(entry: Option<&CacheEntry>) -> Option<&serde_json::Map<String, Value>> {
    entry
        .filter(|entry| entry.is_ok_response())
        .and_then(|entry| entry.response_body.as_object())
}

impl CachedApi {
    /// Fetch the endpoint behind `class` for one tournament.
    pub async fn endpoint(&self, class: ExpiryClass, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.fetch_respectfully(&class.path(tournament_id), class.expiry_secs())
            .await
    }

    pub async fn event_information(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::TournamentInfo, tournament_id).await
    }

    pub async fn tournament_details(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::TournamentDetails, tournament_id).await
    }

    /// Games with the tightest window, for judges running a cage.
    pub async fn live_games(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::LiveGames, tournament_id).await
    }

    pub async fn tournament_games(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::QueueGames, tournament_id).await
    }

    pub async fn archive_games(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::ArchiveGames, tournament_id).await
    }

    pub async fn players(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::Players, tournament_id).await
    }

    pub async fn event_locations(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::EventLocations, tournament_id).await
    }

    pub async fn tournament_locations(&self, tournament_id: &str) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::TournamentLocations, tournament_id)
            .await
    }

    /// Tournaments owned by the configured account.
    pub async fn user_tournaments(&self) -> Result<Option<CacheEntry>, Error> {
        self.endpoint(ExpiryClass::OwnedTournaments, "").await
    }

    /// Owned tournaments, each merged with its details response.
    ///
    /// Detail fields win on key collisions. Tournaments without an id or
    /// without usable details are skipped.
    pub async fn owned_tournaments_with_details(&self) -> Result<Vec<Value>, Error> {
        let owned = self.user_tournaments().await?;
        let tournaments = list_body(owned.as_ref());
        let mut merged = Vec::with_capacity(tournaments.len());

        for tournament in tournaments {
            let Some(base) = tournament.as_object() else {
                tracing::warn!("owned tournament entry is not an object");
                continue;
            };
            let Some(id) = base.get("id").and_then(Value::as_str) else {
                tracing::warn!("owned tournament entry has no id");
                continue;
            };

            let details = self.tournament_details(id).await?;
            match object_body(details.as_ref()) {
                Some(details) => {
                    let mut combined = base.clone();
                    combined.extend(details.iter().map(|(k, v)| (k.clone(), v.clone())));
                    merged.push(Value::Object(combined));
                }
                None => tracing::warn!(tournament_id = id, "no details found for owned tournament"),
            }
        }

        tracing::debug!(count = merged.len(), "owned tournaments with details");
        Ok(merged)
    }

    /// Games in state `done`, read through the archive window.
    pub async fn completed_matches(&self, tournament_id: &str) -> Result<Vec<Value>, Error> {
        let games = self.archive_games(tournament_id).await?;
        Ok(list_body(games.as_ref())
            .into_iter()
            .filter(|game| game.get("state").and_then(Value::as_str) == Some("done"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::ScriptedUpstream;
    use super::*;
    use crate::truefinals::UpstreamResponse;
    use bracketeer_core::{CacheDb, ManualClock};
    use serde_json::json;

    async fn setup() -> (CachedApi, Arc<ScriptedUpstream>, Arc<ManualClock>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let upstream = Arc::new(ScriptedUpstream::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let api = CachedApi::new(db, upstream.clone()).with_clock(clock.clone());
        (api, upstream, clock)
    }

    #[tokio::test]
    async fn test_games_windows_share_rows() {
        let (api, upstream, clock) = setup().await;
        let path = "/v1/tournaments/T1/games";
        upstream.push(path, Ok(UpstreamResponse::new(200, json!([]))));
        upstream.push(path, Ok(UpstreamResponse::new(200, json!([{"id": "g"}]))));

        api.archive_games("T1").await.unwrap();
        clock.advance(10.0);

        // Archive window still fresh, live window is not.
        api.archive_games("T1").await.unwrap();
        assert_eq!(upstream.calls_to(path), 1);
        let live = api.live_games("T1").await.unwrap().unwrap();
        assert_eq!(upstream.calls_to(path), 2);
        assert_eq!(live.response_body, json!([{"id": "g"}]));
    }

    /// Calls made to `path` by two reads `secs` apart.
    async fn calls_after<F, Fut>(path: &str, secs: f64, read: F) -> usize
    where
        F: Fn(CachedApi) -> Fut,
        Fut: std::future::Future<Output = Result<Option<CacheEntry>, Error>>,
    {
        let (api, upstream, clock) = setup().await;
        upstream.push(path, Ok(UpstreamResponse::new(200, json!({"id": "T1"}))));
        upstream.push(path, Ok(UpstreamResponse::new(200, json!({"id": "T1"}))));

        let first = read(api.clone()).await.unwrap().unwrap();
        assert_eq!(first.endpoint_path, path);
        clock.advance(secs);
        read(api).await.unwrap();
        upstream.calls_to(path)
    }

    #[tokio::test]
    async fn test_catalogue_paths_and_windows() {
        let info = "/v1/tournaments/T1";
        assert_eq!(calls_after(info, 119.0, |api| async move { api.event_information("T1").await }).await, 1);
        assert_eq!(calls_after(info, 120.0, |api| async move { api.event_information("T1").await }).await, 2);

        let locations = "/v1/tournaments/T1/locations";
        assert_eq!(calls_after(locations, 3599.0, |api| async move { api.event_locations("T1").await }).await, 1);
        assert_eq!(calls_after(locations, 3600.0, |api| async move { api.event_locations("T1").await }).await, 2);
        assert_eq!(calls_after(locations, 599.0, |api| async move { api.tournament_locations("T1").await }).await, 1);
        assert_eq!(calls_after(locations, 600.0, |api| async move { api.tournament_locations("T1").await }).await, 2);
    }

    #[tokio::test]
    async fn test_completed_matches_filters_done() {
        let (api, upstream, _clock) = setup().await;
        upstream.push(
            "/v1/tournaments/T1/games",
            Ok(UpstreamResponse::new(
                200,
                json!([
                    {"id": "a", "state": "done"},
                    {"id": "b", "state": "active"},
                    {"id": "c"},
                    {"id": "d", "state": "done"},
                ]),
            )),
        );

        let done = api.completed_matches("T1").await.unwrap();
        let ids: Vec<_> = done.iter().map(|g| g["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_completed_matches_ignores_error_body() {
        let (api, upstream, _clock) = setup().await;
        upstream.push(
            "/v1/tournaments/T1/games",
            Ok(UpstreamResponse::new(404, json!([{"state": "done"}]))),
        );
        assert!(api.completed_matches("T1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owned_tournaments_with_details() {
        let (api, upstream, _clock) = setup().await;
        upstream.push(
            "/v1/user/tournaments",
            Ok(UpstreamResponse::new(200, json!([{"id": "T1", "name": "Old"}, {"id": "T2"}, {"name": "no id"}]))),
        );
        upstream.push(
            "/v1/tournaments/T1/details",
            Ok(UpstreamResponse::new(200, json!({"name": "Beetleweight", "state": "active"}))),
        );
        upstream.push("/v1/tournaments/T2/details", Ok(UpstreamResponse::new(404, json!({"error": "gone"}))));

        let merged = api.owned_tournaments_with_details().await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["id"], "T1");
        assert_eq!(merged[0]["name"], "Beetleweight");
        assert_eq!(merged[0]["state"], "active");
    }

    #[tokio::test]
    async fn test_owned_tournaments_empty_when_unavailable() {
        let (api, upstream, _clock) = setup().await;
        upstream.push("/v1/user/tournaments", Err(crate::truefinals::UpstreamError::Timeout));
        assert!(api.owned_tournaments_with_details().await.unwrap().is_empty());
    }
}
