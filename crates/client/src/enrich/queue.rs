//! Match queue across the configured tournaments.

use std::collections::BTreeMap;

use bracketeer_core::{Error, TournamentKey};
use serde::Serialize;
use serde_json::Value;

use super::players::PlayerResolver;
use super::{BYE_PREFIX, MatchView, NameSource, SlotKind, SlotView, tournament_display_name};
use crate::cached::CachedApi;
use crate::cached::endpoints::list_body;

/// Game states shown in the queue. `done` and `unavailable` are left out.
pub const QUEUE_STATES: [&str; 4] = ["called", "ready", "active", "available"];

/// Matches in the debug summary's detail list.
const DEBUG_DETAIL_LIMIT: usize = 20;

/// Queue grouped by stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchQueue {
    /// Fighting now, most recently called first.
    pub active: Vec<MatchView>,
    /// Called or ready, longest waiting first.
    pub on_deck: Vec<MatchView>,
    /// Available, in upstream order.
    pub upcoming: Vec<MatchView>,
    pub active_count: usize,
    pub on_deck_count: usize,
    pub upcoming_count: usize,
}

impl MatchQueue {
    /// Group and order matches. Matches outside [`QUEUE_STATES`] are dropped.
    pub fn from_matches(matches: impl IntoIterator<Item = MatchView>) -> Self {
        let mut queue = MatchQueue::default();
        for view in matches {
            match view.state() {
                Some("active") => queue.active.push(view),
                Some("called" | "ready") => queue.on_deck.push(view),
                Some("available") => queue.upcoming.push(view),
                _ => {}
            }
        }

        queue
            .active
            .sort_by(|a, b| b.called_since().total_cmp(&a.called_since()));
        queue
            .on_deck
            .sort_by(|a, b| a.called_since().total_cmp(&b.called_since()));

        queue.active_count = queue.active.len();
        queue.on_deck_count = queue.on_deck.len();
        queue.upcoming_count = queue.upcoming.len();
        queue
    }

    /// Active, then on deck, then upcoming.
    pub fn all(&self) -> impl Iterator<Item = &MatchView> {
        self.active
            .iter()
            .chain(self.on_deck.iter())
            .chain(self.upcoming.iter())
    }

    pub fn into_all(self) -> Vec<MatchView> {
        let mut all = self.active;
        all.extend(self.on_deck);
        all.extend(self.upcoming);
        all
    }

    pub fn len(&self) -> usize {
        self.active_count + self.on_deck_count + self.upcoming_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn enrich_slot(resolver: &mut PlayerResolver<'_>, slot: Value) -> Result<SlotView, Error> {
    let player_id = slot
        .get("playerID")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let Some(player_id) = player_id else {
        return Ok(SlotView::tbd(slot));
    };
    if player_id.starts_with(BYE_PREFIX) {
        return Ok(SlotView::bye(&player_id, slot));
    }

    let record_name = resolver
        .resolve(&player_id)
        .await?
        .and_then(|record| record.name().map(str::to_string));
    let slot_name = ["playerName", "name"]
        .iter()
        .find_map(|field| slot.get(*field).and_then(Value::as_str).filter(|n| !n.is_empty()))
        .map(str::to_string);

    let (name, source) = match (record_name, slot_name) {
        (Some(name), _) => (name, NameSource::PlayerRecord),
        (None, Some(name)) => (name, NameSource::Slot),
        (None, None) => {
            tracing::debug!(player_id = %player_id, "player name unresolved");
            (player_id.clone(), NameSource::Unresolved)
        }
    };

    Ok(SlotView { kind: SlotKind::Player, player_id: Some(player_id), name, source, raw: slot })
}

/// All games of one tournament with player names resolved.
///
/// Games are read through the 15 second queue window. Non-object entries are skipped.
pub async fn enrich_tournament_matches(
    api: &CachedApi, tournament_id: &str, display_name: &str,
) -> Result<Vec<MatchView>, Error> {
    let games = list_body(api.tournament_games(tournament_id).await?.as_ref());
    let mut resolver = PlayerResolver::new(api, tournament_id);
    let mut views = Vec::with_capacity(games.len());

    for game in games {
        let Value::Object(mut game) = game else {
            continue;
        };
        let raw_slots = match game.remove("slots") {
            Some(Value::Array(slots)) => slots,
            _ => Vec::new(),
        };

        let mut slots = Vec::with_capacity(raw_slots.len());
        for slot in raw_slots {
            slots.push(enrich_slot(&mut resolver, slot).await?);
        }

        views.push(MatchView {
            tournament_id: tournament_id.to_string(),
            tournament_display_name: display_name.to_string(),
            slots,
            game,
        });
    }

    tracing::debug!(tournament_id, count = views.len(), "enriched matches");
    Ok(views)
}

async fn all_matches(api: &CachedApi, tournaments: &[TournamentKey]) -> Result<Vec<MatchView>, Error> {
    let mut matches = Vec::new();
    for key in tournaments.iter().filter(|key| key.is_truefinals()) {
        let display_name = tournament_display_name(api, key).await;
        matches.extend(enrich_tournament_matches(api, &key.id, &display_name).await?);
    }
    Ok(matches)
}

/// Queue across every configured TrueFinals tournament.
pub async fn match_queue(api: &CachedApi, tournaments: &[TournamentKey]) -> Result<MatchQueue, Error> {
    Ok(MatchQueue::from_matches(all_matches(api, tournaments).await?))
}

/// One line of the debug summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDetail {
    pub name: String,
    pub state: String,
    pub tournament: String,
    pub winner: Value,
    pub has_winner: bool,
}

/// Match counts by state, unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSummary {
    pub state_summary: BTreeMap<String, usize>,
    pub total_matches: usize,
    pub match_details: Vec<MatchDetail>,
}

impl StateSummary {
    pub fn from_matches(matches: &[MatchView]) -> Self {
        let mut summary = StateSummary { total_matches: matches.len(), ..Default::default() };
        for view in matches {
            let state = view.state().unwrap_or("unknown").to_string();
            *summary.state_summary.entry(state.clone()).or_default() += 1;

            if summary.match_details.len() < DEBUG_DETAIL_LIMIT {
                let winner = view.game.get("winner").cloned().unwrap_or(Value::Null);
                let has_winner = match &winner {
                    Value::Null | Value::Bool(false) => false,
                    Value::String(s) => !s.is_empty(),
                    _ => true,
                };
                summary.match_details.push(MatchDetail {
                    name: view.name().unwrap_or("Unknown").to_string(),
                    state,
                    tournament: view.tournament_id.clone(),
                    winner,
                    has_winner,
                });
            }
        }
        summary
    }
}

/// State counts across every configured TrueFinals tournament.
pub async fn state_summary(api: &CachedApi, tournaments: &[TournamentKey]) -> Result<StateSummary, Error> {
    Ok(StateSummary::from_matches(&all_matches(api, tournaments).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cached::testing::ScriptedUpstream;
    use crate::truefinals::UpstreamResponse;
    use bracketeer_core::{CacheDb, ManualClock};
    use serde_json::{Map, json};

    fn view(id: &str, state: &str, called_since: Option<i64>) -> MatchView {
        let mut game = Map::new();
        game.insert("id".into(), json!(id));
        game.insert("state".into(), json!(state));
        if let Some(t) = called_since {
            game.insert("calledSince".into(), json!(t));
        }
        MatchView { tournament_id: "T1".into(), tournament_display_name: "Ants".into(), slots: Vec::new(), game }
    }

    fn ids(views: &[MatchView]) -> Vec<&str> {
        views.iter().map(|v| v.game["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_queue_grouping_and_order() {
        let queue = MatchQueue::from_matches(vec![
            view("u1", "available", None),
            view("a1", "active", Some(100)),
            view("d1", "done", Some(50)),
            view("c1", "called", Some(300)),
            view("a2", "active", Some(200)),
            view("r1", "ready", Some(100)),
            view("u2", "available", None),
            view("x1", "unavailable", None),
        ]);

        assert_eq!(ids(&queue.active), vec!["a2", "a1"]);
        assert_eq!(ids(&queue.on_deck), vec!["r1", "c1"]);
        assert_eq!(ids(&queue.upcoming), vec!["u1", "u2"]);
        assert_eq!((queue.active_count, queue.on_deck_count, queue.upcoming_count), (2, 2, 2));
        assert_eq!(ids(&queue.into_all()), vec!["a2", "a1", "r1", "c1", "u1", "u2"]);
    }

    #[test]
    fn test_missing_called_since_sorts_as_zero() {
        let queue = MatchQueue::from_matches(vec![view("c1", "called", Some(10)), view("c2", "called", None)]);
        assert_eq!(ids(&queue.on_deck), vec!["c2", "c1"]);
    }

    #[test]
    fn test_state_summary() {
        let mut won = view("m2", "done", None);
        won.game.insert("winner".into(), json!("p1"));
        let mut nameless = view("m3", "available", None);
        nameless.game.remove("state");

        let summary = StateSummary::from_matches(&[view("m1", "done", None), won, nameless]);
        assert_eq!(summary.total_matches, 3);
        assert_eq!(summary.state_summary["done"], 2);
        assert_eq!(summary.state_summary["unknown"], 1);
        assert!(summary.match_details[1].has_winner);
        assert!(!summary.match_details[0].has_winner);
        assert_eq!(summary.match_details[0].name, "Unknown");
    }

    #[tokio::test]
    async fn test_match_queue_enriches_slots() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let upstream = Arc::new(ScriptedUpstream::new());
        let api = CachedApi::new(db, upstream.clone()).with_clock(Arc::new(ManualClock::new(1_700_000_000.0)));

        upstream.push("/v1/tournaments/T1/details", Ok(UpstreamResponse::new(200, json!({"title": "Beetles"}))));
        upstream.push(
            "/v1/tournaments/T1/players",
            Ok(UpstreamResponse::new(200, json!([{"id": "p1", "name": "Lynx"}]))),
        );
        upstream.push(
            "/v1/tournaments/T1/games",
            Ok(UpstreamResponse::new(
                200,
                json!([
                    {"id": "g1", "name": "A1", "state": "called", "calledSince": 5, "slots": [
                        {"playerID": "p1"},
                        {"playerID": "bye-1"},
                    ]},
                    {"id": "g2", "name": "A2", "state": "available", "slots": [
                        {"playerID": "p9", "playerName": "From Slot"},
                        {"playerID": null},
                    ]},
                    {"id": "g3", "name": "A3", "state": "done", "slots": []},
                ]),
            )),
        );

        let tournaments = vec![
            TournamentKey { id: "T1".into(), weightclass: None, tourn_type: "truefinals".into() },
            TournamentKey { id: "C1".into(), weightclass: None, tourn_type: "challonge".into() },
        ];
        let queue = match_queue(&api, &tournaments).await.unwrap();

        assert_eq!(queue.len(), 2);
        let called = &queue.on_deck[0];
        assert_eq!(called.tournament_display_name, "Beetles");
        assert_eq!(called.slots[0].name, "Lynx");
        assert_eq!(called.slots[0].source, NameSource::PlayerRecord);
        assert_eq!(called.slots[1].kind, SlotKind::Bye);
        assert!(!called.game.contains_key("slots"));

        let upcoming = &queue.upcoming[0];
        assert_eq!(upcoming.slots[0].name, "From Slot");
        assert_eq!(upcoming.slots[0].source, NameSource::Slot);
        assert_eq!(upcoming.slots[1].kind, SlotKind::Tbd);
        assert_eq!(upcoming.slots[1].name, "TBD");

        assert_eq!(upstream.calls_to("/v1/tournaments/T1/players"), 1);
        assert_eq!(upstream.calls_to("/v1/tournaments/C1/games"), 0);
    }
}
