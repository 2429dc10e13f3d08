//! Per-endpoint freshness policy.
//!
//! Volatile in-play data gets short windows to keep the live queue fresh;
//! static data gets long ones to save rate-limit budget.

use serde::{Deserialize, Serialize};

/// Volatility class of an upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryClass {
    /// `/v1/tournaments/{id}`
    TournamentInfo,
    /// `/v1/tournaments/{id}/details`
    TournamentDetails,
    /// `/v1/tournaments/{id}/games` while a judge is running matches.
    LiveGames,
    /// `/v1/tournaments/{id}/games` for the match queue.
    QueueGames,
    /// `/v1/tournaments/{id}/games` for completed-match and archive views.
    ArchiveGames,
    /// `/v1/tournaments/{id}/players`
    Players,
    /// `/v1/tournaments/{id}/locations` for event setup.
    EventLocations,
    /// `/v1/tournaments/{id}/locations` for arena assignment.
    TournamentLocations,
    /// `/v1/user/tournaments`
    OwnedTournaments,
}

impl ExpiryClass {
    pub const fn expiry_secs(self) -> u64 {
        match self {
            ExpiryClass::TournamentInfo => 120,
            ExpiryClass::TournamentDetails => 120,
            ExpiryClass::LiveGames => 5,
            ExpiryClass::QueueGames => 15,
            ExpiryClass::ArchiveGames => 5 * 60,
            ExpiryClass::Players => 5 * 60,
            ExpiryClass::EventLocations => 60 * 60,
            ExpiryClass::TournamentLocations => 10 * 60,
            ExpiryClass::OwnedTournaments => 10 * 60,
        }
    }

    /// Endpoint path for this class.
    ///
    /// `tournament_id` is ignored for [`ExpiryClass::OwnedTournaments`].
    pub fn path(self, tournament_id: &str) -> String {
        match self {
            ExpiryClass::TournamentInfo => format!("/v1/tournaments/{tournament_id}"),
            ExpiryClass::TournamentDetails => format!("/v1/tournaments/{tournament_id}/details"),
            ExpiryClass::LiveGames | ExpiryClass::QueueGames | ExpiryClass::ArchiveGames => {
                format!("/v1/tournaments/{tournament_id}/games")
            }
            ExpiryClass::Players => format!("/v1/tournaments/{tournament_id}/players"),
            ExpiryClass::EventLocations | ExpiryClass::TournamentLocations => {
                format!("/v1/tournaments/{tournament_id}/locations")
            }
            ExpiryClass::OwnedTournaments => "/v1/user/tournaments".to_string(),
        }
    }
}
