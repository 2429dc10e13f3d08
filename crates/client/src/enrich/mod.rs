//! View-ready match records built from cached TrueFinals data.
//!
//! Nothing here is persisted except resolved players. Every read recomputes
//! the views from whatever the request cache currently holds.

mod names;
mod players;
mod queue;

pub use names::{display_name_from_details, fallback_display_name, tournament_display_name};
pub use players::{PlayerResolver, resolve_player};
pub use queue::{
    MatchDetail, MatchQueue, QUEUE_STATES, StateSummary, enrich_tournament_matches, match_queue, state_summary,
};

use serde::Serialize;
use serde_json::{Map, Value};

/// Player ids with this prefix are placeholder opponents.
pub const BYE_PREFIX: &str = "bye-";

/// What occupies a competitor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Player,
    Bye,
    /// No player assigned yet.
    Tbd,
}

/// Where a slot's display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    PlayerRecord,
    Slot,
    Synthetic,
    Unresolved,
}

/// One competitor slot with its resolved name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub kind: SlotKind,
    pub player_id: Option<String>,
    pub name: String,
    pub source: NameSource,
    /// The slot object as upstream sent it.
    pub raw: Value,
}

impl SlotView {
    pub fn tbd(raw: Value) -> Self {
        Self { kind: SlotKind::Tbd, player_id: None, name: "TBD".to_string(), source: NameSource::Synthetic, raw }
    }

    pub fn bye(player_id: &str, raw: Value) -> Self {
        Self {
            kind: SlotKind::Bye,
            player_id: Some(player_id.to_string()),
            name: "BYE".to_string(),
            source: NameSource::Synthetic,
            raw,
        }
    }
}

/// An upstream game enriched with tournament and player names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    pub tournament_id: String,
    pub tournament_display_name: String,
    pub slots: Vec<SlotView>,
    /// Remaining upstream fields (`id`, `name`, `state`, `calledSince`, ...).
    #[serde(flatten)]
    pub game: Map<String, Value>,
}

impl MatchView {
    pub fn state(&self) -> Option<&str> {
        self.game.get("state").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.game.get("name").and_then(Value::as_str)
    }

    /// `calledSince` as a number, 0 when absent.
    pub fn called_since(&self) -> f64 {
        self.game
            .get("calledSince")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}
