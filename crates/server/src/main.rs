//! bracketeer server entry point.
//!
//! Boots the HTTP server carrying the event relay and match-queue routes,
//! and the background purge of the request cache.

use anyhow::{Context, Result};
use bracketeer_core::AppConfig;
use bracketeer_server::{AppState, init_tracing, router, spawn_purge_task};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    let bind_addr = config.bind_addr.clone();
    let purge = config
        .purge_interval()
        .map(|every| (every, config.purge_max_age_secs));

    let state = AppState::from_config(config).await?;
    if let Some((every, max_age_secs)) = purge {
        spawn_purge_task(state.api.clone(), every, max_age_secs);
        tracing::info!(every_secs = every.as_secs(), max_age_secs, "scheduled cache purge");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "Starting bracketeer server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
