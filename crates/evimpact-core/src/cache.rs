//! Read-through caching decorator for price series collaborators.
//!
//! Caching belongs to the collaborator side: the engine only ever sees a
//! [`PriceSeriesAccess`] handle. Wrap a slow source in [`CachedPriceSeries`]
//! and inject it; the engine itself holds no process-wide state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::source::{BarQuery, PriceSeriesAccess, SourceFuture};
use crate::PriceBar;

#[derive(Debug, Clone)]
struct CacheEntry {
    bars: Vec<PriceBar>,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl CacheInner {
    fn get(&self, key: &str) -> Option<Vec<PriceBar>> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() <= entry.expires_at {
                Some(entry.bars.clone())
            } else {
                None
            }
        })
    }

    /// Inserts `bars` and drops every entry that has already expired.
    fn put(&mut self, key: String, bars: Vec<PriceBar>) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.map.insert(
            key,
            CacheEntry {
                bars,
                expires_at: now + self.ttl,
            },
        );
    }
}

/// TTL cache in front of another [`PriceSeriesAccess`].
///
/// Successful reads are cached per exact query; failures are never cached.
/// A zero TTL disables caching entirely.
pub struct CachedPriceSeries<S> {
    inner: S,
    cache: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl<S: PriceSeriesAccess> CachedPriceSeries<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                ttl,
            })),
        }
    }

    /// Cache with a default TTL of 5 minutes.
    pub fn with_default_ttl(inner: S) -> Self {
        Self::new(inner, Duration::from_secs(300))
    }

    /// Number of stored entries, including expired ones.
    pub async fn len(&self) -> usize {
        self.cache.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove expired entries.
    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.cache
            .write()
            .await
            .map
            .retain(|_, entry| entry.expires_at > now);
    }

    pub async fn clear(&self) {
        self.cache.write().await.map.clear();
    }
}

fn cache_key(query: &BarQuery) -> String {
    format!(
        "{}|{}|{}|{}",
        query.instrument,
        query.interval,
        query.start.unix_timestamp(),
        query.end.unix_timestamp()
    )
}

impl<S: PriceSeriesAccess> PriceSeriesAccess for CachedPriceSeries<S> {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            let key = cache_key(&query);
            if let Some(bars) = self.cache.read().await.get(&key) {
                return Ok(bars);
            }

            let bars = self.inner.get_bars(query).await?;

            let mut cache = self.cache.write().await;
            if cache.ttl != Duration::ZERO {
                cache.put(key, bars.clone());
            }
            Ok(bars)
        })
    }
}
