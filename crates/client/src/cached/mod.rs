//! Rate-limit aware read-through cache over the TrueFinals API.
//!
//! Lookups follow three steps:
//!
//! 1. Serve the newest successful row still inside the caller's expiry.
//! 2. On a miss, call upstream once and append the answer (or the failure).
//! 3. Re-read; if nothing fresh and successful exists, fall back to the newest
//!    successful row of any age. No row at all is a valid empty result.
//!
//! Upstream trouble never propagates out of [`CachedApi::fetch_respectfully`];
//! only storage errors do.

pub(crate) mod endpoints;
mod expiry;

pub use expiry::ExpiryClass;

use std::sync::Arc;

use bracketeer_core::cache::requests::DEFAULT_PURGE_MAX_AGE_SECS;
use bracketeer_core::{AppConfig, CacheDb, CacheEntry, Clock, Error, Freshness, PurgeStats, RateLimitPolicy, SystemClock};

use crate::truefinals::{RateLimitHeaders, Upstream};

/// Read-through cache in front of an [`Upstream`].
#[derive(Clone)]
pub struct CachedApi {
    db: CacheDb,
    upstream: Arc<dyn Upstream>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
    auth_error_expiry_secs: Option<f64>,
}

impl std::fmt::Debug for CachedApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedApi")
            .field("db", &self.db)
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("auth_error_expiry_secs", &self.auth_error_expiry_secs)
            .finish_non_exhaustive()
    }
}

impl CachedApi {
    /// Advisory rate limiting, system clock, 30s cap on cached auth failures.
    pub fn new(db: CacheDb, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            db,
            upstream,
            clock: Arc::new(SystemClock),
            policy: RateLimitPolicy::Advisory,
            auth_error_expiry_secs: Some(30.0),
        }
    }

    pub fn from_config(db: CacheDb, upstream: Arc<dyn Upstream>, config: &AppConfig) -> Self {
        Self::new(db, upstream)
            .with_policy(config.rate_limit_policy)
            .with_auth_error_expiry(Some(config.auth_error_expiry_secs as f64))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cap freshness of cached 401/403 answers; None treats them like any 4xx.
    pub fn with_auth_error_expiry(mut self, secs: Option<f64>) -> Self {
        self.auth_error_expiry_secs = secs;
        self
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn freshness(&self, expiry_secs: u64) -> Freshness {
        Freshness::Within { expiry_secs: expiry_secs as f64, auth_error_expiry_secs: self.auth_error_expiry_secs }
    }

    /// Whether the recent request count has reached the self-imposed budget.
    pub async fn rate_limited(&self) -> Result<bool, Error> {
        self.db.rate_limited(self.now()).await
    }

    /// Newest successful row for `endpoint_path` younger than `expiry_secs`.
    pub async fn get(&self, endpoint_path: &str, expiry_secs: u64) -> Result<Option<CacheEntry>, Error> {
        self.db
            .get_request(endpoint_path, self.freshness(expiry_secs), self.now())
            .await
    }

    /// Read-through lookup.
    ///
    /// Returns `Ok(None)` only when nothing usable has ever been stored for
    /// the path. Callers must check `status_code` before trusting the body:
    /// 4xx answers are cached as definitive.
    pub async fn fetch_respectfully(&self, endpoint_path: &str, expiry_secs: u64) -> Result<Option<CacheEntry>, Error> {
        if let Some(hit) = self.get(endpoint_path, expiry_secs).await? {
            tracing::debug!(endpoint = endpoint_path, expiry_secs, "cache hit");
            return Ok(Some(hit));
        }

        if self.rate_limited().await? {
            match self.policy {
                RateLimitPolicy::Advisory => {
                    tracing::warn!(endpoint = endpoint_path, "rate limit budget reached; calling upstream anyway");
                }
                RateLimitPolicy::Enforce => {
                    if let Some(stale) = self.db.get_request(endpoint_path, Freshness::Any, self.now()).await? {
                        tracing::info!(
                            endpoint = endpoint_path,
                            age_secs = self.now() - stale.last_requested,
                            "rate limited; serving stale entry"
                        );
                        return Ok(Some(stale));
                    }
                    tracing::warn!(endpoint = endpoint_path, "rate limited with nothing cached; calling upstream");
                }
            }
        }

        self.refresh(endpoint_path).await?;

        if let Some(fresh) = self.get(endpoint_path, expiry_secs).await? {
            return Ok(Some(fresh));
        }

        let stale = self.db.get_request(endpoint_path, Freshness::Any, self.now()).await?;
        match &stale {
            Some(entry) => tracing::info!(
                endpoint = endpoint_path,
                status = entry.status_code,
                "upstream gave no usable answer; serving stale entry"
            ),
            None => tracing::warn!(endpoint = endpoint_path, "no cached data and upstream gave no usable answer"),
        }
        Ok(stale)
    }

    /// Call upstream once and record the attempt.
    async fn refresh(&self, endpoint_path: &str) -> Result<(), Error> {
        tracing::info!(endpoint = endpoint_path, "cache miss, requesting upstream");
        let requested_at = self.now();

        let entry = match self.upstream.get(endpoint_path).await {
            Ok(resp) => {
                if resp.status >= 500 {
                    tracing::warn!(endpoint = endpoint_path, status = resp.status, "upstream server error");
                }
                CacheEntry::from_response(endpoint_path, resp.status, resp.body, resp.headers, requested_at)
            }
            Err(e) if e.reached_network() => {
                tracing::warn!(endpoint = endpoint_path, error = %e, "upstream request failed");
                CacheEntry::network_failure(endpoint_path, requested_at)
            }
            Err(e) => {
                tracing::warn!(endpoint = endpoint_path, error = %e, "upstream request not sent");
                return Ok(());
            }
        };

        self.db.insert_request(&entry).await
    }

    /// Remove failed rows older than ten minutes and every row older than `max_age_secs`.
    pub async fn purge(&self, max_age_secs: u64) -> Result<PurgeStats, Error> {
        let stats = self.db.purge_requests(max_age_secs as f64, self.now()).await?;
        tracing::info!(
            max_age_secs,
            failed_deleted = stats.failed_deleted,
            aged_deleted = stats.aged_deleted,
            "purged request cache"
        );
        Ok(stats)
    }

    /// Purge with the default one-hour age.
    pub async fn purge_default(&self) -> Result<PurgeStats, Error> {
        self.purge(DEFAULT_PURGE_MAX_AGE_SECS as u64).await
    }

    /// Clear stored rows so the next reads go upstream.
    ///
    /// Under [`RateLimitPolicy::Enforce`] nothing is cleared while the budget
    /// is spent: the rows being purged are the ones the budget is counted from.
    /// Returns whether the purge ran.
    pub async fn force_refresh(&self) -> Result<bool, Error> {
        if self.policy == RateLimitPolicy::Enforce && self.rate_limited().await? {
            tracing::info!("rate limited; ignoring refresh request");
            return Ok(false);
        }
        self.purge(0).await?;
        Ok(true)
    }

    /// Upstream counters from the newest recorded response.
    pub async fn last_rate_limit_headers(&self) -> Result<Option<RateLimitHeaders>, Error> {
        Ok(self
            .db
            .latest_response_headers()
            .await?
            .map(|headers| RateLimitHeaders::from_json(&headers)))
    }
}
