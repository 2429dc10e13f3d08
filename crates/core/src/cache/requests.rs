//! Upstream request history.
//!
//! Every upstream call attempt appends one [`CacheEntry`]. Rows are never
//! updated in place, so two racing writers simply produce two rows and the
//! newest one wins on read.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Sliding window over which recent requests are counted.
pub const RATE_LIMIT_WINDOW_SECS: f64 = 10.0;

/// Half of the upstream's published 10 requests / 10 seconds.
pub const RATE_LIMIT_MAX_REQUESTS: i64 = 5;

/// Failed rows older than this are removed by every purge.
pub const FAILED_ROW_MAX_AGE_SECS: f64 = 600.0;

/// Default age after which every row is removed.
pub const DEFAULT_PURGE_MAX_AGE_SECS: f64 = 3600.0;

/// Status recorded when the upstream produced no HTTP response at all.
pub const NETWORK_FAILURE_STATUS: u16 = 0;

/// One recorded upstream call attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub id: String,
    pub endpoint_path: String,
    pub response_body: Value,
    /// Seconds since the Unix epoch.
    pub last_requested: f64,
    pub successful: bool,
    pub status_code: u16,
    pub response_headers: Value,
}

impl CacheEntry {
    /// Build a row for an upstream response received at `requested_at`.
    ///
    /// `successful` is derived from the status: anything in `200..500`
    /// counts as a definitive answer, including client errors.
    pub fn from_response(
        endpoint_path: &str, status_code: u16, response_body: Value, response_headers: Value, requested_at: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint_path: endpoint_path.to_string(),
            response_body,
            last_requested: requested_at,
            successful: is_successful_status(status_code),
            status_code,
            response_headers,
        }
    }

    /// Build a row for a call that never produced an HTTP response.
    pub fn network_failure(endpoint_path: &str, requested_at: f64) -> Self {
        Self::from_response(
            endpoint_path,
            NETWORK_FAILURE_STATUS,
            Value::Null,
            Value::Object(Default::default()),
            requested_at,
        )
    }

    /// Whether the stored body is a 2xx/3xx payload rather than an error answer.
    pub fn is_ok_response(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

/// Whether a status code is a cacheable, definitive answer.
pub fn is_successful_status(status: u16) -> bool {
    (200..500).contains(&status)
}

/// Freshness predicate for a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freshness {
    /// Row must satisfy `last_requested + expiry > now`.
    ///
    /// Rows holding a 401/403 answer use `min(expiry, auth_error_expiry)`
    /// when an auth cap is given.
    Within { expiry_secs: f64, auth_error_expiry_secs: Option<f64> },
    /// Any age is acceptable.
    Any,
}

impl Freshness {
    pub fn within(expiry_secs: f64) -> Self {
        Freshness::Within { expiry_secs, auth_error_expiry_secs: None }
    }
}

/// Rows removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PurgeStats {
    pub failed_deleted: u64,
    pub aged_deleted: u64,
}

impl PurgeStats {
    pub fn total(&self) -> u64 {
        self.failed_deleted + self.aged_deleted
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, endpoint_path, response_body, last_requested, successful, status_code, response_headers
     FROM request_cache";

struct RawEntry {
    id: String,
    endpoint_path: String,
    response_body: String,
    last_requested: f64,
    successful: bool,
    status_code: u16,
    response_headers: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            endpoint_path: row.get(1)?,
            response_body: row.get(2)?,
            last_requested: row.get(3)?,
            successful: row.get::<_, i32>(4)? == 1,
            status_code: row.get(5)?,
            response_headers: row.get(6)?,
        })
    }

    fn decode(self) -> Result<CacheEntry, Error> {
        Ok(CacheEntry {
            id: self.id,
            endpoint_path: self.endpoint_path,
            response_body: serde_json::from_str(&self.response_body)?,
            last_requested: self.last_requested,
            successful: self.successful,
            status_code: self.status_code,
            response_headers: serde_json::from_str(&self.response_headers)?,
        })
    }
}

impl CacheDb {
    /// Append a request row.
    pub async fn insert_request(&self, entry: &CacheEntry) -> Result<(), Error> {
        let body = serde_json::to_string(&entry.response_body)?;
        let headers = serde_json::to_string(&entry.response_headers)?;
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO request_cache (
                        id, endpoint_path, response_body, last_requested,
                        successful, status_code, response_headers
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        &entry.id,
                        &entry.endpoint_path,
                        body,
                        entry.last_requested,
                        entry.successful as i32,
                        entry.status_code,
                        headers,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Newest successful row for `endpoint_path` satisfying `freshness` at `now`.
    ///
    /// Returns None on a miss or when every row is stale.
    pub async fn get_request(
        &self, endpoint_path: &str, freshness: Freshness, now: f64,
    ) -> Result<Option<CacheEntry>, Error> {
        let endpoint_path = endpoint_path.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let result = match freshness {
                    Freshness::Any => {
                        let sql = format!(
                            "{SELECT_COLUMNS}
                             WHERE endpoint_path = ?1 AND successful = 1
                             ORDER BY last_requested DESC, rowid DESC LIMIT 1"
                        );
                        conn.query_row(&sql, params![endpoint_path], RawEntry::from_row)
                    }
                    Freshness::Within { expiry_secs, auth_error_expiry_secs } => {
                        let auth_expiry = auth_error_expiry_secs.map_or(expiry_secs, |cap| cap.min(expiry_secs));
                        let sql = format!(
                            "{SELECT_COLUMNS}
                             WHERE endpoint_path = ?1 AND successful = 1
                             AND last_requested + CASE
                                 WHEN status_code IN (401, 403) THEN ?3
                                 ELSE ?2
                             END > ?4
                             ORDER BY last_requested DESC, rowid DESC LIMIT 1"
                        );
                        conn.query_row(
                            &sql,
                            params![endpoint_path, expiry_secs, auth_expiry, now],
                            RawEntry::from_row,
                        )
                    }
                };

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Number of rows requested strictly within the last `window_secs` before `now`.
    pub async fn count_recent_requests(&self, window_secs: f64, now: f64) -> Result<i64, Error> {
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM request_cache WHERE last_requested > ?1",
                    params![now - window_secs],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(Error::from)
    }

    /// True iff at least five rows were requested within the last ten seconds.
    ///
    /// Pure query; the gate itself is applied (or not) by the caller.
    pub async fn rate_limited(&self, now: f64) -> Result<bool, Error> {
        let recent = self.count_recent_requests(RATE_LIMIT_WINDOW_SECS, now).await?;
        Ok(recent >= RATE_LIMIT_MAX_REQUESTS)
    }

    /// Delete failed rows older than ten minutes, then every row older than `max_age_secs`.
    ///
    /// Only removes rows; entries already read into memory are unaffected.
    pub async fn purge_requests(&self, max_age_secs: f64, now: f64) -> Result<PurgeStats, Error> {
        self.conn
            .call(move |conn| -> Result<PurgeStats, Error> {
                let failed = conn.execute(
                    "DELETE FROM request_cache WHERE successful = 0 AND last_requested + ?1 < ?2",
                    params![FAILED_ROW_MAX_AGE_SECS, now],
                )?;
                let aged = conn.execute(
                    "DELETE FROM request_cache WHERE last_requested + ?1 < ?2",
                    params![max_age_secs, now],
                )?;
                Ok(PurgeStats { failed_deleted: failed as u64, aged_deleted: aged as u64 })
            })
            .await
            .map_err(Error::from)
    }

    /// Most recent rows across all paths, newest first.
    pub async fn recent_requests(&self, limit: usize) -> Result<Vec<CacheEntry>, Error> {
        let limit = limit as i64;
        let raws = self
            .conn
            .call(move |conn| -> Result<Vec<RawEntry>, Error> {
                let sql = format!("{SELECT_COLUMNS} ORDER BY last_requested DESC, rowid DESC LIMIT ?1");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![limit], RawEntry::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        raws.into_iter().map(RawEntry::decode).collect()
    }

    /// Headers of the newest row that came back with an HTTP response.
    pub async fn latest_response_headers(&self) -> Result<Option<Value>, Error> {
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT response_headers FROM request_cache
                     WHERE status_code <> ?1
                     ORDER BY last_requested DESC, rowid DESC LIMIT 1",
                    params![NETWORK_FAILURE_STATUS],
                    |row| row.get(0),
                );
                match result {
                    Ok(headers) => Ok(Some(headers)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }
}
