//! SQLite-backed store for upstream responses and relay diagnostics.
//!
//! This module provides a persistent, append-only request cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request history keyed by upstream endpoint path
//! - Freshness-windowed lookups with a stale fallback
//! - A sliding-window rate-limit count over recent requests
//! - Age-based purging with a shorter window for failed rows
//! - Resolved player records and connected client records
//! - Automatic schema migrations, WAL mode for concurrent readers

pub mod clients;
pub mod connection;
pub mod hash;
pub mod migrations;
pub mod players;
pub mod requests;

pub use crate::Error;

pub use clients::ClientRecord;
pub use connection::CacheDb;
pub use players::PlayerRecord;
pub use requests::{CacheEntry, Freshness, PurgeStats};
