//! Diagnostic records for relay connections.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;

/// A relay connection that announced its presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub connection_sid: String,
    pub information: Value,
    /// Seconds since the Unix epoch.
    pub first_seen: f64,
}

impl CacheDb {
    /// Record a connection unless it is already known.
    ///
    /// Returns true when a new row was written.
    pub async fn register_client(&self, connection_sid: &str, information: &Value, now: f64) -> Result<bool, Error> {
        let connection_sid = connection_sid.to_string();
        let information = serde_json::to_string(information)?;
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT INTO clients (id, connection_sid, information, first_seen)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(connection_sid) DO NOTHING",
                    params![uuid::Uuid::new_v4().to_string(), connection_sid, information, now],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Known clients, most recently seen first.
    pub async fn list_clients(&self, limit: usize) -> Result<Vec<ClientRecord>, Error> {
        let limit = limit as i64;
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String, String, f64)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, connection_sid, information, first_seen
                     FROM clients ORDER BY first_seen DESC, rowid DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(id, connection_sid, information, first_seen)| {
                Ok(ClientRecord { id, connection_sid, information: serde_json::from_str(&information)?, first_seen })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_client_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let info = json!({"remote_addr": "10.0.0.4:5123"});

        assert!(db.register_client("sid-1", &info, 1.0).await.unwrap());
        assert!(!db.register_client("sid-1", &json!({}), 2.0).await.unwrap());

        let clients = db.list_clients(10).await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].information, info);
        assert_eq!(clients[0].first_seen, 1.0);
    }

    #[tokio::test]
    async fn test_list_clients_newest_first() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.register_client("sid-a", &json!({}), 1.0).await.unwrap();
        db.register_client("sid-b", &json!({}), 2.0).await.unwrap();

        let sids: Vec<String> = db
            .list_clients(10)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.connection_sid)
            .collect();
        assert_eq!(sids, vec!["sid-b", "sid-a"]);
    }
}
