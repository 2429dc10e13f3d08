//! bracketeer server library.
//!
//! Hosts the WebSocket event relay, the JSON match-queue and diagnostics
//! routes, the background cache purge, and the MCP admin tool handler used by
//! the `bracketeer-admin` binary.

pub mod app;
pub mod error;
pub mod handler;
pub mod purge;
pub mod relay;
pub mod routes;
pub mod tools;
pub mod ws;

pub use app::{AppState, router};
pub use error::ServerError;
pub use handler::AdminServer;
pub use purge::spawn_purge_task;
pub use relay::{ClientEvent, EventRelay, RelayConnection, ServerEvent};

use tracing_subscriber::EnvFilter;

/// JSON logs to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();
}
