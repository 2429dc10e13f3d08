//! Core types and shared functionality for bracketeer.
//!
//! This crate provides:
//! - SQLite-backed request cache, player records and client records
//! - Unified error types
//! - Configuration structures
//! - Wall-clock abstraction used by freshness and rate-limit checks

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, ClientRecord, Freshness, PlayerRecord, PurgeStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, RateLimitPolicy, TournamentKey};
pub use error::Error;
