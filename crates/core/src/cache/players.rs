//! Resolved player records.
//!
//! Player display names are resolved once per roster fetch and kept per
//! (tournament, player) pair so match enrichment does not re-derive them.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached player keyed by tournament and upstream player id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub pk_id: String,
    pub tournament_id: String,
    pub player_id: String,
    /// Seconds since the Unix epoch.
    pub last_updated: f64,
    pub player_data: Value,
}

impl PlayerRecord {
    /// Display name from the stored player object, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.player_data
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

impl CacheDb {
    /// Insert or refresh a batch of players for one tournament.
    ///
    /// Runs in a single transaction. Returns the number of rows written.
    pub async fn upsert_players(
        &self, tournament_id: &str, players: Vec<(String, Value)>, now: f64,
    ) -> Result<u64, Error> {
        let tournament_id = tournament_id.to_string();
        let encoded = players
            .into_iter()
            .map(|(id, data)| Ok((id, serde_json::to_string(&data)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut written = 0u64;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO tournament_players (pk_id, tournament_id, player_id, last_updated, player_data)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(tournament_id, player_id) DO UPDATE SET
                             last_updated = excluded.last_updated,
                             player_data = excluded.player_data",
                    )?;
                    for (player_id, data) in &encoded {
                        written += stmt.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            &tournament_id,
                            player_id,
                            now,
                            data,
                        ])? as u64;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up one player.
    ///
    /// With `max_age_secs`, records last updated at or before `now - max_age_secs`
    /// are treated as absent.
    pub async fn get_player(
        &self, tournament_id: &str, player_id: &str, max_age_secs: Option<f64>, now: f64,
    ) -> Result<Option<PlayerRecord>, Error> {
        let tournament_id = tournament_id.to_string();
        let player_id = player_id.to_string();
        let oldest = max_age_secs.map_or(f64::NEG_INFINITY, |age| now - age);

        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(String, String, String, f64, String)>, Error> {
                let result = conn.query_row(
                    "SELECT pk_id, tournament_id, player_id, last_updated, player_data
                     FROM tournament_players
                     WHERE tournament_id = ?1 AND player_id = ?2 AND last_updated > ?3",
                    params![tournament_id, player_id, oldest],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                );
                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(|(pk_id, tournament_id, player_id, last_updated, data)| {
            Ok(PlayerRecord { pk_id, tournament_id, player_id, last_updated, player_data: serde_json::from_str(&data)? })
        })
        .transpose()
    }
}
