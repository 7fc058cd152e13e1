//! In-process cache for curated rankings.
//!
//! Entries are keyed by surface, category filter, geo bucket and limit, and
//! live for a fixed TTL:
//! - Stale entries are ignored on read and replaced by the next computation
//! - When the store grows past `sweep_threshold`, stale entries are evicted
//! - Entries are never mutated in place; the latest computation wins
//!
//! `DashMap` shards the store, so a read-check-then-write only locks the
//! shard holding that key. Two concurrent misses on the same key may both
//! compute; the computation is side-effect free, so the later write simply wins.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::CurationMetrics;
use crate::models::GeoPoint;
use crate::utils::round_coordinate;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Bucket used when the request carries no location.
pub const NO_GEO_BUCKET: &str = "nogeo";

/// Time source, injectable so tests control expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    surface: &'static str,
    category: String,
    geo_bucket: String,
    limit: usize,
}

impl CacheKey {
    /// `category` must already be normalized; `None` is stored as `all`.
    pub fn new(
        surface: &'static str,
        category: Option<&str>,
        geo: Option<GeoPoint>,
        limit: usize,
        precision: u32,
    ) -> Self {
        Self {
            surface,
            category: category.unwrap_or("all").to_string(),
            geo_bucket: geo_bucket(geo, precision),
            limit,
        }
    }

    pub fn geo_bucket(&self) -> &str {
        &self.geo_bucket
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.surface, self.category, self.geo_bucket, self.limit
        )
    }
}

fn geo_bucket(geo: Option<GeoPoint>, precision: u32) -> String {
    match geo {
        Some(p) if p.lat.is_finite() && p.lng.is_finite() => {
            let p_usize = precision as usize;
            // `+ 0.0` folds -0.0 into 0.0 so both sides of the meridian share a bucket
            let lat = round_coordinate(p.lat, precision) + 0.0;
            let lng = round_coordinate(p.lng, precision) + 0.0;
            format!("{:.*},{:.*}", p_usize, lat, p_usize, lng)
        }
        _ => NO_GEO_BUCKET.to_string(),
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

pub struct CurationCache<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    sweep_threshold: usize,
    clock: Arc<dyn Clock>,
}

impl<V> CurationCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl_secs = config.ttl_secs.min(i32::MAX as u64) as i64;
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
            sweep_threshold: config.sweep_threshold,
            clock,
        }
    }

    /// Return the fresh entry for `key`, or run `compute` and store its result.
    ///
    /// Errors from `compute` are returned and nothing is stored.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get_fresh(key) {
            debug!(key = %key, "Curation cache hit");
            CurationMetrics::record_hit();
            return Ok(value);
        }

        debug!(key = %key, "Curation cache miss");
        CurationMetrics::record_miss();

        let value = compute().await?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    fn get_fresh(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if self.is_fresh(&entry, now) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn insert(&self, key: CacheKey, value: V) {
        let created_at = self.clock.now();
        self.entries.insert(key, CacheEntry { value, created_at });

        if self.entries.len() > self.sweep_threshold {
            self.sweep();
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.created_at) < self.ttl
    }

    /// Evict every stale entry. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        let evicted = before.saturating_sub(self.entries.len());

        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Swept curation cache");
            CurationMetrics::record_sweep_evicted(evicted);
        }
        evicted
    }

    /// Drop every bucket for a normalized category (`None` = the all-categories buckets).
    pub fn invalidate_category(&self, category: Option<&str>) -> usize {
        let category = category.unwrap_or("all");
        let before = self.entries.len();
        self.entries.retain(|key, _| key.category != category);
        let removed = before.saturating_sub(self.entries.len());
        debug!(category, removed, "Invalidated curation cache category");
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CurationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Utc::now())))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn config(threshold: usize) -> CacheConfig {
        CacheConfig {
            ttl_secs: 300,
            sweep_threshold: threshold,
            geo_precision: 2,
        }
    }

    fn key(category: &str) -> CacheKey {
        CacheKey::new("curated", Some(category), None, 10, 2)
    }

    async fn counted(cache: &CurationCache<u32>, key: &CacheKey, calls: &AtomicUsize) -> u32 {
        cache
            .get_or_compute(key, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
                Ok(n)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hit_within_ttl_computes_once() {
        let clock = ManualClock::new();
        let cache = CurationCache::with_clock(&config(100), clock.clone());
        let calls = AtomicUsize::new(0);
        let k = key("food");

        assert_eq!(counted(&cache, &k, &calls).await, 1);
        clock.advance(299);
        assert_eq!(counted(&cache, &k, &calls).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let clock = ManualClock::new();
        let cache = CurationCache::with_clock(&config(100), clock.clone());
        let calls = AtomicUsize::new(0);
        let k = key("food");

        assert_eq!(counted(&cache, &k, &calls).await, 1);
        clock.advance(300);
        assert_eq!(counted(&cache, &k, &calls).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: CurationCache<u32> = CurationCache::new(&config(100));
        let k = key("food");

        let result = cache
            .get_or_compute(&k, || async {
                Err(CurationError::Repository("down".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_evicts_stale_entries_over_threshold() {
        let clock = ManualClock::new();
        let cache = CurationCache::with_clock(&config(2), clock.clone());
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("a"), &calls).await;
        counted(&cache, &key("b"), &calls).await;
        clock.advance(301);
        // Third insert crosses the threshold and sweeps the two stale entries
        counted(&cache, &key("c"), &calls).await;

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_category_drops_all_buckets() {
        let cache = CurationCache::new(&config(100));
        let calls = AtomicUsize::new(0);
        let near = CacheKey::new("curated", Some("food"), Some(GeoPoint::new(1.0, 2.0)), 10, 2);
        let far = CacheKey::new("curated", Some("food"), Some(GeoPoint::new(9.0, 9.0)), 10, 2);

        counted(&cache, &near, &calls).await;
        counted(&cache, &far, &calls).await;
        counted(&cache, &key("bars"), &calls).await;

        assert_eq!(cache.invalidate_category(Some("food")), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_nearby_points_share_a_bucket() {
        let a = CacheKey::new("curated", None, Some(GeoPoint::new(37.7749, -122.4194)), 13, 2);
        let b = CacheKey::new("curated", None, Some(GeoPoint::new(37.7712, -122.4171)), 13, 2);
        let c = CacheKey::new("curated", None, Some(GeoPoint::new(37.8044, -122.2712)), 13, 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "curated:all:37.77,-122.42:13");
    }

    #[test]
    fn test_missing_or_invalid_geo_uses_sentinel() {
        let none = CacheKey::new("featured", Some("food"), None, 5, 2);
        let nan = CacheKey::new("featured", Some("food"), Some(GeoPoint::new(f64::NAN, 1.0)), 5, 2);

        assert_eq!(none.geo_bucket(), NO_GEO_BUCKET);
        assert_eq!(none, nan);
    }

    #[test]
    fn test_negative_zero_bucket() {
        let a = CacheKey::new("curated", None, Some(GeoPoint::new(-0.001, 0.001)), 5, 2);
        assert_eq!(a.geo_bucket(), "0.00,0.00");
    }
}
