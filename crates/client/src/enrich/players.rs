//! Player name resolution backed by the players table.

use bracketeer_core::{Error, PlayerRecord};
use serde_json::Value;

use crate::cached::{CachedApi, ExpiryClass};

/// Records younger than this are used without touching the roster.
const PLAYER_MAX_AGE_SECS: f64 = ExpiryClass::Players.expiry_secs() as f64;

/// Resolves players of one tournament, refreshing the roster at most once.
#[derive(Debug)]
pub struct PlayerResolver<'a> {
    api: &'a CachedApi,
    tournament_id: String,
    roster_loaded: bool,
}

impl<'a> PlayerResolver<'a> {
    pub fn new(api: &'a CachedApi, tournament_id: &str) -> Self {
        Self { api, tournament_id: tournament_id.to_string(), roster_loaded: false }
    }

    /// Fresh record, else reload the roster and retry, else any stored record.
    pub async fn resolve(&mut self, player_id: &str) -> Result<Option<PlayerRecord>, Error> {
        if let Some(record) = self.lookup(player_id, Some(PLAYER_MAX_AGE_SECS)).await? {
            return Ok(Some(record));
        }

        if !self.roster_loaded {
            self.roster_loaded = true;
            self.load_roster().await?;
            if let Some(record) = self.lookup(player_id, Some(PLAYER_MAX_AGE_SECS)).await? {
                return Ok(Some(record));
            }
        }

        self.lookup(player_id, None).await
    }

    async fn lookup(&self, player_id: &str, max_age_secs: Option<f64>) -> Result<Option<PlayerRecord>, Error> {
        self.api
            .db()
            .get_player(&self.tournament_id, player_id, max_age_secs, self.api.now())
            .await
    }

    /// Copy the cached roster into the players table.
    ///
    /// Rows take the roster response's request time, so a stale roster does
    /// not produce records that look fresh.
    async fn load_roster(&self) -> Result<(), Error> {
        let Some(entry) = self.api.players(&self.tournament_id).await? else {
            tracing::warn!(tournament_id = %self.tournament_id, "no roster available");
            return Ok(());
        };
        if !entry.is_ok_response() {
            tracing::warn!(tournament_id = %self.tournament_id, status = entry.status_code, "roster request rejected");
            return Ok(());
        }

        let players: Vec<(String, Value)> = entry
            .response_body
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|player| {
                        let id = player.get("id").and_then(Value::as_str)?;
                        Some((id.to_string(), player.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let written = self
            .api
            .db()
            .upsert_players(&self.tournament_id, players, entry.last_requested)
            .await?;
        tracing::debug!(tournament_id = %self.tournament_id, written, "stored roster");
        Ok(())
    }
}

/// Resolve a single player with a one-off resolver.
pub async fn resolve_player(api: &CachedApi, tournament_id: &str, player_id: &str) -> Result<Option<PlayerRecord>, Error> {
    PlayerResolver::new(api, tournament_id).resolve(player_id).await
}
