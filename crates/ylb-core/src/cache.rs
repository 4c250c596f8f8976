//! Time-bounded cache over the shortener's full listing.
//!
//! One process-wide snapshot, replaced in place on refresh. A read older than
//! the TTL refreshes synchronously first. Refreshes are single-flight: callers
//! that queued behind an in-flight refresh reuse its result instead of issuing
//! their own `list_all`, whether that refresh succeeded or failed.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::{domain::ShortUrl, ports::ShortenerGateway, Error, Result};

pub type Snapshot = Arc<Vec<ShortUrl>>;

#[derive(Default)]
struct CacheState {
    snapshot: Option<Snapshot>,
    fetched_at: Option<Instant>,
    /// Bumped on every refresh attempt, failed ones included.
    attempts: u64,
    last_error: Option<String>,
}

impl CacheState {
    fn fresh_at(&self, now: Instant, ttl: Duration) -> Option<Snapshot> {
        if ttl.is_zero() {
            return None;
        }
        let fetched_at = self.fetched_at?;
        if now.saturating_duration_since(fetched_at) > ttl {
            return None;
        }
        self.snapshot.clone()
    }
}

pub struct ListingCache {
    gateway: Arc<dyn ShortenerGateway>,
    ttl: Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

impl ListingCache {
    /// `ttl` of zero disables caching: every read refreshes.
    pub fn new(gateway: Arc<dyn ShortenerGateway>, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.snapshot_at(Instant::now()).await
    }

    /// Snapshot as seen at `now`; refreshes first if the cached one is stale.
    ///
    /// Falls back to the stale snapshot when the refresh fails, and to
    /// `Unavailable` when nothing was ever fetched.
    pub async fn snapshot_at(&self, now: Instant) -> Result<Snapshot> {
        let seen_attempts = {
            let st = self.state.read().await;
            if let Some(snapshot) = st.fresh_at(now, self.ttl) {
                return Ok(snapshot);
            }
            st.attempts
        };

        let _refresh = self.refresh.lock().await;

        {
            let st = self.state.read().await;
            if st.attempts != seen_attempts {
                return match (&st.snapshot, &st.last_error) {
                    (Some(snapshot), _) => Ok(snapshot.clone()),
                    (None, Some(e)) => Err(Error::Unavailable(e.clone())),
                    (None, None) => Err(Error::Unavailable("no listing fetched".to_string())),
                };
            }
        }

        match self.gateway.list_all().await {
            Ok(list) => {
                let fetched: Snapshot = Arc::new(list);
                let mut st = self.state.write().await;
                st.attempts += 1;
                st.last_error = None;
                if st.fetched_at.is_some_and(|installed| installed > now) {
                    debug!("discarding listing refresh older than installed snapshot");
                    return Ok(st.snapshot.clone().unwrap_or(fetched));
                }
                debug!(entries = fetched.len(), "listing cache refreshed");
                st.snapshot = Some(fetched.clone());
                st.fetched_at = Some(now);
                Ok(fetched)
            }
            Err(e) => {
                let mut st = self.state.write().await;
                st.attempts += 1;
                st.last_error = Some(e.to_string());
                match &st.snapshot {
                    Some(stale) => {
                        warn!(error = %e, "listing refresh failed; serving stale snapshot");
                        Ok(stale.clone())
                    }
                    None => Err(Error::Unavailable(e.to_string())),
                }
            }
        }
    }

    /// The record with exactly this keyword, if the listing has one.
    pub async fn exists(&self, keyword: &str) -> Result<Option<ShortUrl>> {
        self.exists_at(keyword, Instant::now()).await
    }

    pub async fn exists_at(&self, keyword: &str, now: Instant) -> Result<Option<ShortUrl>> {
        let snapshot = self.snapshot_at(now).await?;
        Ok(snapshot.iter().find(|r| r.keyword == keyword).cloned())
    }
}
