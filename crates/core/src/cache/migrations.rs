//! Versioned schema for the cache store.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered `(version, sql)` steps. Every statement is create-if-absent, so a
/// step that is re-run against an existing table changes nothing.
const STEPS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_request_cache.sql")),
    (2, include_str!("../../migrations/002_tournament_players.sql")),
    (3, include_str!("../../migrations/003_clients.sql")),
];

pub(crate) fn latest_version() -> i64 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Apply every step newer than the recorded version, each in its own transaction.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;
        let applied: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in STEPS.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("v{version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}
