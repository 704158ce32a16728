//! Negative result cache.
//!
//! Remembers queries that recently failed so identical queries can be
//! skipped until their TTL runs out. Entries are keyed by a
//! non-cryptographic hash of the query; a collision only causes one
//! spurious skip.

use moka::future::Cache;
use moka::Expiry;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::NegativeCacheConfig;

/// A remembered failure.
#[derive(Debug, Clone)]
pub struct NegativeCacheEntry {
    pub query: String,

    /// When the failure was recorded
    pub timestamp: Instant,

    pub reason: String,

    pub ttl: Duration,
}

impl NegativeCacheEntry {
    /// Whether the TTL has run out.
    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() >= self.ttl
    }
}

/// Gives every entry its own TTL inside moka.
struct EntryTtl;

impl Expiry<u64, NegativeCacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &u64,
        value: &NegativeCacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &u64,
        value: &NegativeCacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Cache of failed queries using moka.
pub struct NegativeCache {
    cache: Cache<u64, NegativeCacheEntry>,
    default_ttl: Duration,
}

impl NegativeCache {
    /// Create a cache holding at most `max_entries` failures.
    pub fn new(max_entries: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();

        Self { cache, default_ttl }
    }

    pub fn from_config(config: &NegativeCacheConfig) -> Self {
        Self::new(config.max_entries, config.default_ttl)
    }

    /// Look up a live failure for `query`.
    ///
    /// An expired entry is evicted on the way out.
    pub async fn get(&self, query: &str) -> Option<NegativeCacheEntry> {
        let key = hash_query(query);
        let entry = self.cache.get(&key).await?;

        if entry.is_expired() {
            self.cache.invalidate(&key).await;
            tracing::debug!(query = %query, "Negative cache entry expired");
            return None;
        }

        tracing::debug!(query = %query, reason = %entry.reason, "Negative cache hit");
        Some(entry)
    }

    /// Whether `query` is known to be failing.
    pub async fn contains(&self, query: &str) -> bool {
        self.get(query).await.is_some()
    }

    /// Record a failure with the default TTL.
    pub async fn set(&self, query: &str, reason: impl Into<String>) {
        self.set_with_ttl(query, reason, self.default_ttl).await;
    }

    /// Record a failure, replacing any previous entry for the query.
    pub async fn set_with_ttl(&self, query: &str, reason: impl Into<String>, ttl: Duration) {
        let entry = NegativeCacheEntry {
            query: query.to_string(),
            timestamp: Instant::now(),
            reason: reason.into(),
            ttl,
        };
        self.cache.insert(hash_query(query), entry).await;
    }

    /// Forget one query.
    pub async fn invalidate(&self, query: &str) {
        self.cache.invalidate(&hash_query(query)).await;
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for NegativeCache {
    fn default() -> Self {
        Self::from_config(&NegativeCacheConfig::default())
    }
}

fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = NegativeCache::default();

        cache
            .set_with_ttl("fn parse_header", "no matches", Duration::from_millis(100))
            .await;
        let entry = cache.get("fn parse_header").await.unwrap();
        assert_eq!(entry.reason, "no matches");
        assert_eq!(entry.query, "fn parse_header");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("fn parse_header").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_with_fresh_timestamp() {
        let cache = NegativeCache::default();

        cache
            .set_with_ttl("jira PROJ-1", "timeout", Duration::from_millis(100))
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache
            .set_with_ttl("jira PROJ-1", "503", Duration::from_millis(100))
            .await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let entry = cache.get("jira PROJ-1").await.unwrap();
        assert_eq!(entry.reason, "503");
    }

    #[tokio::test]
    async fn test_miss_and_clear() {
        let cache = NegativeCache::new(100, Duration::from_secs(60));
        assert!(cache.get("anything").await.is_none());

        cache.set("query a", "failed").await;
        cache.set("query b", "failed").await;
        assert!(cache.contains("query a").await);
        assert_eq!(cache.get("query b").await.unwrap().ttl, Duration::from_secs(60));

        cache.invalidate("query a").await;
        assert!(!cache.contains("query a").await);

        cache.clear();
        assert!(!cache.contains("query b").await);
    }
}
