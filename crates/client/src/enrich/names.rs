//! Tournament display names.

use bracketeer_core::TournamentKey;
use serde_json::{Map, Value};

use crate::cached::CachedApi;
use crate::cached::endpoints::object_body;

/// Detail fields checked for a human name, in order.
const NAME_FIELDS: [&str; 4] = ["title", "name", "tournamentName", "event_name"];

/// Weightclass, else `Tournament <id>`.
///
/// TrueFinals ids are shortened to their first eight characters.
pub fn fallback_display_name(key: &TournamentKey) -> String {
    if let Some(weightclass) = key.weightclass.as_deref().filter(|w| !w.is_empty()) {
        return weightclass.to_string();
    }
    if key.is_truefinals() {
        format!("Tournament {}", key.id.chars().take(8).collect::<String>())
    } else {
        format!("Tournament {}", key.id)
    }
}

/// First present name field of a details object, else the fallback.
pub fn display_name_from_details(details: Option<&Map<String, Value>>, key: &TournamentKey) -> String {
    details
        .and_then(|details| {
            NAME_FIELDS
                .iter()
                .find_map(|field| details.get(*field).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| fallback_display_name(key))
}

/// Display name for a configured tournament. Never fails.
pub async fn tournament_display_name(api: &CachedApi, key: &TournamentKey) -> String {
    if !key.is_truefinals() {
        return fallback_display_name(key);
    }
    match api.tournament_details(&key.id).await {
        Ok(entry) => display_name_from_details(object_body(entry.as_ref()), key),
        Err(e) => {
            tracing::warn!(tournament_id = %key.id, error = %e, "tournament details unavailable");
            fallback_display_name(key)
        }
    }
}
