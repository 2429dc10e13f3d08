//! SQLite handle shared by the request cache, player records and client records.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// WAL lets dashboard reads proceed while a fetch is being recorded.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA busy_timeout=5000;
     PRAGMA temp_store=MEMORY;";

/// Store handle. Cloning is cheap and every clone talks to the same
/// background thread, so writes are serialized at the storage layer.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the store at `path` and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::info!(path = %path.display(), "opened cache store");
        Self::prepare(conn).await
    }

    /// Private in-memory store; each call gets an empty database.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await.map_err(Error::from)?;
        migrations::run(&conn).await?;
        Ok(Self { conn })
    }

    /// Highest applied schema version.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_store_is_fully_migrated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), migrations::latest_version());
    }

    #[tokio::test]
    async fn test_in_memory_stores_are_isolated() {
        let a = CacheDb::open_in_memory().await.unwrap();
        let b = CacheDb::open_in_memory().await.unwrap();
        a.register_client("sid-1", &serde_json::json!({}), 1.0).await.unwrap();

        assert_eq!(a.list_clients(10).await.unwrap().len(), 1);
        assert!(b.list_clients(10).await.unwrap().is_empty());
    }
}
