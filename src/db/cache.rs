use moka::{sync::Cache as MokaCache, Expiry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::models::{MovieId, UserId};

/// Independently TTL'd partition of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheRegion {
    UserMetadata,
    Embeddings,
    Recommendations,
    PopularMovies,
    UserRatedIds,
}

impl CacheRegion {
    pub const ALL: [CacheRegion; 5] = [
        CacheRegion::UserMetadata,
        CacheRegion::Embeddings,
        CacheRegion::Recommendations,
        CacheRegion::PopularMovies,
        CacheRegion::UserRatedIds,
    ];

    /// Regions derived from a user's ratings or collections
    pub const USER_SCOPED: [CacheRegion; 3] = [
        CacheRegion::UserMetadata,
        CacheRegion::Recommendations,
        CacheRegion::UserRatedIds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRegion::UserMetadata => "user_metadata",
            CacheRegion::Embeddings => "embeddings",
            CacheRegion::Recommendations => "recommendations",
            CacheRegion::PopularMovies => "popular_movies",
            CacheRegion::UserRatedIds => "user_rated_ids",
        }
    }
}

impl Display for CacheRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CacheRegion {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheRegion::ALL
            .into_iter()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown cache region '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    /// Profiles depend on the seed threshold they were built with
    UserMetadata { user_id: UserId, min_rating: f64 },
    Embedding(MovieId),
    Recommendations { user_id: UserId, fingerprint: String },
    PopularMovies(usize),
    UserRatedIds(UserId),
}

impl CacheKey {
    pub fn region(&self) -> CacheRegion {
        match self {
            CacheKey::UserMetadata { .. } => CacheRegion::UserMetadata,
            CacheKey::Embedding(_) => CacheRegion::Embeddings,
            CacheKey::Recommendations { .. } => CacheRegion::Recommendations,
            CacheKey::PopularMovies(_) => CacheRegion::PopularMovies,
            CacheKey::UserRatedIds(_) => CacheRegion::UserRatedIds,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::UserMetadata {
                user_id,
                min_rating,
            } => write!(f, "{}:min{}", user_id, min_rating),
            CacheKey::Embedding(movie_id) => write!(f, "{}", movie_id),
            CacheKey::Recommendations {
                user_id,
                fingerprint,
            } => write!(f, "{}:{}", user_id, fingerprint),
            CacheKey::PopularMovies(limit) => write!(f, "top{}", limit),
            CacheKey::UserRatedIds(user_id) => write!(f, "{}", user_id),
        }
    }
}

/// Whether a raw key of a user-scoped region belongs to `user_id`
fn key_belongs_to_user(raw: &str, user_id: UserId) -> bool {
    let id = user_id.to_string();
    match raw.strip_prefix(id.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with(':'),
        None => false,
    }
}

/// Default time-to-live for each region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionTtls {
    pub user_metadata: Duration,
    pub embeddings: Duration,
    pub recommendations: Duration,
    pub popular_movies: Duration,
    pub user_rated_ids: Duration,
}

impl Default for RegionTtls {
    fn default() -> Self {
        Self {
            user_metadata: Duration::from_secs(5 * 60),
            embeddings: Duration::from_secs(10 * 60),
            recommendations: Duration::from_secs(3 * 60),
            popular_movies: Duration::from_secs(30 * 60),
            user_rated_ids: Duration::from_secs(3 * 60),
        }
    }
}

impl RegionTtls {
    pub fn for_region(&self, region: CacheRegion) -> Duration {
        match region {
            CacheRegion::UserMetadata => self.user_metadata,
            CacheRegion::Embeddings => self.embeddings,
            CacheRegion::Recommendations => self.recommendations,
            CacheRegion::PopularMovies => self.popular_movies,
            CacheRegion::UserRatedIds => self.user_rated_ids,
        }
    }
}

/// Maximum live entries per region unless configured otherwise
pub const DEFAULT_REGION_CAPACITY: u64 = 10_000;

/// Snapshot of cache counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    /// hits / (hits + misses), 0 before the first lookup
    pub hit_rate: f64,
    pub region_key_counts: BTreeMap<CacheRegion, u64>,
}

#[derive(Debug)]
struct CachedValue {
    value: serde_json::Value,
    ttl: Duration,
}

/// Expires every entry after the TTL it was last written with
struct WriteTtl;

impl Expiry<String, Arc<CachedValue>> for WriteTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<CachedValue>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CachedValue>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

struct Region {
    ttl: Duration,
    entries: MokaCache<String, Arc<CachedValue>>,
}

impl Region {
    fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            ttl,
            entries: MokaCache::builder()
                .max_capacity(capacity)
                .expire_after(WriteTtl)
                .build(),
        }
    }

    /// Removes every live key matching `predicate`, returning how many went
    fn remove_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let keys: Vec<Arc<String>> = self
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| predicate(key.as_str()))
            .collect();

        keys.iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count()
    }
}

struct CacheInner {
    regions: HashMap<CacheRegion, Region>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// In-process region cache shared by every component of the engine
///
/// Each region is a `moka` cache whose entries expire after the TTL they were
/// written with; moka evicts expired entries during its own maintenance.
/// An undecodable value degrades to a miss.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(RegionTtls::default())
    }
}

impl Cache {
    pub fn new(ttls: RegionTtls) -> Self {
        Self::with_capacity(ttls, DEFAULT_REGION_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` entries per region
    pub fn with_capacity(ttls: RegionTtls, capacity: u64) -> Self {
        let regions = CacheRegion::ALL
            .into_iter()
            .map(|region| (region, Region::new(ttls.for_region(region), capacity)))
            .collect();

        Self {
            inner: Arc::new(CacheInner {
                regions,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    fn region(&self, region: CacheRegion) -> &Region {
        // Every variant is inserted in `with_capacity`
        &self.inner.regions[&region]
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` on a miss, on an expired entry, and when the stored
    /// value does not decode into `T`. Hits and misses are counted across
    /// all regions.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let region = self.region(key.region());
        let raw_key = key.to_string();

        let Some(entry) = region.entries.get(&raw_key) else {
            self.record_miss(key);
            return None;
        };

        match T::deserialize(&entry.value) {
            Ok(decoded) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(region = %key.region(), key = %raw_key, "Cache hit");
                Some(decoded)
            }
            Err(e) => {
                tracing::warn!(
                    region = %key.region(),
                    key = %raw_key,
                    error = %e,
                    "Cached value failed to decode, treating as miss"
                );
                region.entries.invalidate(&raw_key);
                self.record_miss(key);
                None
            }
        }
    }

    fn record_miss(&self, key: &CacheKey) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(region = %key.region(), key = %key, "Cache miss");
    }

    /// Stores a value with its region's default TTL
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let ttl = self.region(key.region()).ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Stores a value with an explicit TTL
    pub fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        self.region(key.region())
            .entries
            .insert(key.to_string(), Arc::new(CachedValue { value, ttl }));
    }

    /// Removes one entry, returning whether it existed
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self
            .region(key.region())
            .entries
            .remove(&key.to_string())
            .is_some();

        if removed {
            self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drops every entry of a region, returning how many were removed
    pub fn invalidate_region(&self, region: CacheRegion) -> usize {
        let removed = self.region(region).remove_where(|_| true);

        self.inner
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::info!(region = %region, removed, "Cache region invalidated");
        removed
    }

    /// Drops everything derived from a user's ratings or collections
    ///
    /// Writers of ratings and collections must call this before reporting
    /// success to their own callers.
    pub fn invalidate_user(&self, user_id: UserId) -> usize {
        let removed: usize = CacheRegion::USER_SCOPED
            .into_iter()
            .map(|region| {
                self.region(region)
                    .remove_where(|raw| key_belongs_to_user(raw, user_id))
            })
            .sum();

        self.inner
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!(user_id, removed, "Invalidated cached user data");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let region_key_counts = self
            .inner
            .regions
            .iter()
            .map(|(region, store)| {
                store.entries.run_pending_tasks();
                (*region, store.entries.entry_count())
            })
            .collect();

        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };

        CacheStats {
            hits,
            misses,
            invalidations: self.inner.invalidations.load(Ordering::Relaxed),
            hit_rate,
            region_key_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_key(user_id: UserId) -> CacheKey {
        CacheKey::UserMetadata {
            user_id,
            min_rating: 3.0,
        }
    }

    #[test]
    fn test_cache_key_display() {
        assert_eq!(meta_key(12).to_string(), "12:min3");
        assert_eq!(CacheKey::Embedding(603).to_string(), "603");
        assert_eq!(CacheKey::PopularMovies(10).to_string(), "top10");
        assert_eq!(CacheKey::UserRatedIds(5).to_string(), "5");
        assert_eq!(
            CacheKey::Recommendations {
                user_id: 5,
                fingerprint: "k10".to_string()
            }
            .to_string(),
            "5:k10"
        );
    }

    #[test]
    fn test_region_round_trips_through_str() {
        for region in CacheRegion::ALL {
            assert_eq!(region.as_str().parse::<CacheRegion>().unwrap(), region);
        }
        assert!("sessions".parse::<CacheRegion>().is_err());
    }

    #[test]
    fn test_key_belongs_to_user_respects_boundaries() {
        assert!(key_belongs_to_user("1", 1));
        assert!(key_belongs_to_user("1:min3", 1));
        assert!(!key_belongs_to_user("11", 1));
        assert!(!key_belongs_to_user("11:min3", 1));
        assert!(!key_belongs_to_user("top1", 1));
    }

    #[test]
    fn test_miss_then_hit_updates_counters() {
        let cache = Cache::default();
        let key = CacheKey::UserRatedIds(1);

        assert_eq!(cache.get::<Vec<i64>>(&key), None);
        cache.set(&key, &vec![1_i64, 2, 3]);
        assert_eq!(cache.get::<Vec<i64>>(&key), Some(vec![1, 2, 3]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = Cache::default();
        let key = CacheKey::Embedding(7);

        cache.set_with_ttl(&key, &vec![0.5_f32; 4], Duration::ZERO);

        assert_eq!(cache.get::<Vec<f32>>(&key), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_explicit_ttl_overrides_region_default() {
        let ttls = RegionTtls {
            embeddings: Duration::ZERO,
            ..RegionTtls::default()
        };
        let cache = Cache::new(ttls);

        cache.set(&CacheKey::Embedding(1), &vec![1.0_f32]);
        cache.set_with_ttl(&CacheKey::Embedding(2), &vec![2.0_f32], Duration::from_secs(60));

        assert_eq!(cache.get::<Vec<f32>>(&CacheKey::Embedding(1)), None);
        assert_eq!(cache.get::<Vec<f32>>(&CacheKey::Embedding(2)), Some(vec![2.0]));
    }

    #[test]
    fn test_undecodable_value_degrades_to_miss() {
        let cache = Cache::default();
        let key = CacheKey::UserRatedIds(3);

        cache.set(&key, &"not a list");

        assert_eq!(cache.get::<Vec<i64>>(&key), None);
        // The bad entry is dropped
        assert_eq!(cache.get::<String>(&key), None);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_regions_are_independent() {
        let cache = Cache::default();
        cache.set(&CacheKey::UserRatedIds(1), &vec![1_i64]);
        cache.set(&CacheKey::Embedding(1), &vec![1.0_f32]);

        assert_eq!(cache.invalidate_region(CacheRegion::Embeddings), 1);

        assert_eq!(cache.get::<Vec<f32>>(&CacheKey::Embedding(1)), None);
        assert_eq!(
            cache.get::<Vec<i64>>(&CacheKey::UserRatedIds(1)),
            Some(vec![1])
        );
    }

    #[test]
    fn test_invalidate_single_key() {
        let cache = Cache::default();
        let key = meta_key(9);
        cache.set(&key, &1_u32);

        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        assert_eq!(cache.get::<u32>(&key), None);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_invalidate_user_clears_only_that_user() {
        let cache = Cache::default();
        for user_id in [1, 11] {
            cache.set(&meta_key(user_id), &user_id);
            cache.set(&CacheKey::UserRatedIds(user_id), &vec![user_id]);
            cache.set(
                &CacheKey::Recommendations {
                    user_id,
                    fingerprint: "k10:xtrue:m3".to_string(),
                },
                &user_id,
            );
        }
        cache.set(&CacheKey::Embedding(1), &vec![1.0_f32]);
        cache.set(&CacheKey::PopularMovies(1), &1);

        assert_eq!(cache.invalidate_user(1), 3);

        assert_eq!(cache.get::<i64>(&meta_key(1)), None);
        assert_eq!(cache.get::<i64>(&meta_key(11)), Some(11));
        assert_eq!(cache.get::<Vec<f32>>(&CacheKey::Embedding(1)), Some(vec![1.0]));
        assert_eq!(cache.get::<i64>(&CacheKey::PopularMovies(1)), Some(1));
    }

    #[test]
    fn test_stats_counts_live_keys_per_region() {
        let cache = Cache::default();
        cache.set(&CacheKey::Embedding(1), &1);
        cache.set(&CacheKey::Embedding(2), &2);
        cache.set(&CacheKey::UserRatedIds(1), &vec![1_i64]);
        cache.invalidate(&CacheKey::Embedding(2));

        let stats = cache.stats();
        assert_eq!(stats.region_key_counts.len(), 5);
        assert_eq!(stats.region_key_counts[&CacheRegion::Embeddings], 1);
        assert_eq!(stats.region_key_counts[&CacheRegion::UserRatedIds], 1);
        assert_eq!(stats.region_key_counts[&CacheRegion::PopularMovies], 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_capacity_bounds_each_region() {
        let cache = Cache::with_capacity(RegionTtls::default(), 4);
        for id in 0..64_i64 {
            cache.set(&CacheKey::Embedding(id), &id);
        }

        let stats = cache.stats();
        assert!(stats.region_key_counts[&CacheRegion::Embeddings] <= 4);
    }

    #[tokio::test]
    async fn test_concurrent_writers_and_readers() {
        let cache = Cache::default();
        let mut tasks = Vec::new();

        for i in 0..16_i64 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.set(&CacheKey::Embedding(i), &vec![i as f32]);
                cache.get::<Vec<f32>>(&CacheKey::Embedding(i))
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(cache.stats().hits, 16);
    }
}
