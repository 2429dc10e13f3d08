//! Client code for bracketeer.
//!
//! This crate provides the TrueFinals upstream client, the rate-limit aware
//! read-through cache in front of it, and the match enrichment built on top.

pub mod cached;
pub mod enrich;
pub mod truefinals;

pub use cached::{CachedApi, ExpiryClass};
pub use enrich::{
    MatchQueue, MatchView, NameSource, SlotKind, SlotView, StateSummary, match_queue, resolve_player, state_summary,
    tournament_display_name,
};
pub use truefinals::{
    CredentialCheck, Credentials, RateLimitHeaders, TrueFinalsClient, TrueFinalsConfig, Upstream, UpstreamError,
    UpstreamResponse, check_credentials,
};
