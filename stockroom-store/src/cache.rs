//! Two-tier page cache with explicit freshness.
//!
//! The memory tier answers within the session; the durable tier survives
//! a reload and hydrates the first paint before revalidation. Every
//! freshness decision takes `now` as a parameter, so TTL boundaries are
//! testable without sleeping.

use crate::durable::DurableStore;
use crate::key::PartitionKey;
use crate::page::{CacheRecord, CachedPage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use stockroom_core::{RecordId, Timestamp};

/// Configuration for the tiered page cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Freshness window for the memory tier.
    pub memory_ttl: Duration,
    /// Freshness window for the durable tier; entries older than this
    /// are treated as absent.
    pub durable_ttl: Duration,
    /// Maximum items kept on a page by `upsert_front`.
    pub page_cap: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(30),
            durable_ttl: Duration::from_secs(60 * 60 * 24),
            page_cap: 25,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn with_durable_ttl(mut self, ttl: Duration) -> Self {
        self.durable_ttl = ttl;
        self
    }

    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = cap;
        self
    }
}

/// Whether a cache hit is within the memory freshness window.
///
/// A `Stale` hit is still served; the caller is expected to trigger a
/// background revalidation for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A page held in the memory tier, with its fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: CachedPage<T>,
    pub stored_at: Timestamp,
}

/// Result of a cache lookup, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheHit<T> {
    page: CachedPage<T>,
    freshness: Freshness,
    stored_at: Timestamp,
}

impl<T> CacheHit<T> {
    pub fn page(&self) -> &CachedPage<T> {
        &self.page
    }

    pub fn into_page(self) -> CachedPage<T> {
        self.page
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    pub fn stored_at(&self) -> Timestamp {
        self.stored_at
    }
}

/// Durable-tier envelope: `{ at, data }`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry<T> {
    at: Timestamp,
    data: CachedPage<T>,
}

/// Counters for cache behavior. Purely observational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the memory tier.
    pub hits: u64,
    /// Lookups answered by neither tier.
    pub misses: u64,
    /// Lookups answered by hydrating from the durable tier.
    pub durable_hits: u64,
    /// Durable writes that failed and were swallowed.
    pub durable_write_failures: u64,
}

impl CacheStats {
    /// Fraction of lookups answered by either tier (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.durable_hits;
        let total = answered + self.misses;
        if total == 0 {
            0.0
        } else {
            answered as f64 / total as f64
        }
    }
}

/// Partitioned page cache over one resource.
///
/// One instance per resource collection (issue requests, items, bills,
/// handouts). Mutation happens only through `set`, `invalidate` and the
/// three primitives; the durable tier is written best-effort on every
/// change and never consulted for correctness.
pub struct TieredPageCache<T: CacheRecord> {
    memory: HashMap<PartitionKey, CacheEntry<T>>,
    durable: Option<Box<dyn DurableStore>>,
    config: CacheConfig,
    stats: CacheStats,
}

impl<T: CacheRecord> TieredPageCache<T> {
    /// Memory-only cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            memory: HashMap::new(),
            durable: None,
            config,
            stats: CacheStats::default(),
        }
    }

    /// Cache backed by a durable store.
    pub fn with_durable(config: CacheConfig, durable: Box<dyn DurableStore>) -> Self {
        Self {
            memory: HashMap::new(),
            durable: Some(durable),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Keys currently resident in the memory tier.
    pub fn keys(&self) -> Vec<PartitionKey> {
        self.memory.keys().cloned().collect()
    }

    /// Drop the memory tier, keeping the durable tier intact. This is
    /// what a process restart looks like to the cache.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Look up a page. Memory tier first, durable tier second (bound by
    /// its own TTL, with a hit promoted back into memory), absent when
    /// both miss.
    pub fn get(&mut self, key: &PartitionKey, now: Timestamp) -> Option<CacheHit<T>> {
        if let Some(entry) = self.memory.get(key) {
            let age = age_of(entry.stored_at, now);
            if age <= self.config.durable_ttl {
                self.stats.hits += 1;
                let freshness = if age <= self.config.memory_ttl {
                    Freshness::Fresh
                } else {
                    Freshness::Stale
                };
                return Some(CacheHit {
                    page: entry.value.clone(),
                    freshness,
                    stored_at: entry.stored_at,
                });
            }
            // Older than the durable window: treat as absent.
            self.memory.remove(key);
        }

        if let Some((page, at)) = self.durable_lookup(key, now) {
            self.stats.durable_hits += 1;
            let freshness = if age_of(at, now) <= self.config.memory_ttl {
                Freshness::Fresh
            } else {
                Freshness::Stale
            };
            self.memory.insert(
                key.clone(),
                CacheEntry {
                    value: page.clone(),
                    stored_at: at,
                },
            );
            return Some(CacheHit {
                page,
                freshness,
                stored_at: at,
            });
        }

        self.stats.misses += 1;
        None
    }

    /// Store a freshly fetched page in both tiers.
    pub fn set(&mut self, key: &PartitionKey, page: CachedPage<T>, now: Timestamp) {
        self.persist(key, &page, now);
        self.memory.insert(
            key.clone(),
            CacheEntry {
                value: page,
                stored_at: now,
            },
        );
    }

    /// Drop a key from both tiers.
    pub fn invalidate(&mut self, key: &PartitionKey) {
        self.memory.remove(key);
        if let Some(durable) = self.durable.as_mut() {
            if let Err(err) = durable.remove(&key.durable_key()) {
                tracing::debug!(key = %key, error = %err, "durable remove failed");
            }
        }
    }

    // ========================================================================
    // MUTATION PRIMITIVES (per-key passthroughs)
    // ========================================================================

    /// `upsert_front` on the page cached at `key`, capped by config.
    /// No-op (false) when the key is not cached.
    pub fn upsert_front(&mut self, key: &PartitionKey, record: T) -> bool {
        let cap = self.config.page_cap;
        let Some(entry) = self.memory.get_mut(key) else {
            return false;
        };
        entry.value.upsert_front(record, cap);
        let page = entry.value.clone();
        let at = entry.stored_at;
        self.persist(key, &page, at);
        true
    }

    /// `replace_by_id` on the page cached at `key`.
    pub fn replace_by_id(&mut self, key: &PartitionKey, record: &T) -> bool {
        let Some(entry) = self.memory.get_mut(key) else {
            return false;
        };
        if !entry.value.replace_by_id(record) {
            return false;
        }
        let page = entry.value.clone();
        let at = entry.stored_at;
        self.persist(key, &page, at);
        true
    }

    /// `remove_by_id` on the page cached at `key`.
    pub fn remove_by_id(&mut self, key: &PartitionKey, id: RecordId) -> bool {
        let Some(entry) = self.memory.get_mut(key) else {
            return false;
        };
        if !entry.value.remove_by_id(id) {
            return false;
        }
        let page = entry.value.clone();
        let at = entry.stored_at;
        self.persist(key, &page, at);
        true
    }

    /// Apply `op` to every cached page whose key passes `filter`. The
    /// op receives the key so it can vary by partition. Returns the
    /// number of pages touched.
    pub fn apply_matching<F, M>(&mut self, filter: F, mut op: M) -> usize
    where
        F: Fn(&PartitionKey) -> bool,
        M: FnMut(&PartitionKey, &mut CachedPage<T>),
    {
        let keys: Vec<PartitionKey> = self
            .memory
            .keys()
            .filter(|key| filter(key))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = self.memory.get_mut(key) {
                op(key, &mut entry.value);
                let page = entry.value.clone();
                let at = entry.stored_at;
                self.persist(key, &page, at);
            }
        }
        keys.len()
    }

    // ========================================================================
    // DURABLE TIER (best-effort)
    // ========================================================================

    fn persist(&mut self, key: &PartitionKey, page: &CachedPage<T>, at: Timestamp) {
        let Some(durable) = self.durable.as_mut() else {
            return;
        };
        let envelope = PersistedEntry {
            at,
            data: page.without_placeholders(),
        };
        let result = serde_json::to_string(&envelope)
            .map_err(crate::durable::DurableError::from)
            .and_then(|json| durable.set(&key.durable_key(), &json));
        if let Err(err) = result {
            self.stats.durable_write_failures += 1;
            tracing::debug!(key = %key, error = %err, "durable write failed, memory-only");
        }
    }

    fn durable_lookup(
        &mut self,
        key: &PartitionKey,
        now: Timestamp,
    ) -> Option<(CachedPage<T>, Timestamp)> {
        let durable = self.durable.as_mut()?;
        let json = match durable.get(&key.durable_key()) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "durable read failed");
                return None;
            }
        };
        let envelope: PersistedEntry<T> = match serde_json::from_str(&json) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "durable entry unreadable");
                return None;
            }
        };
        if age_of(envelope.at, now) > self.config.durable_ttl {
            return None;
        }
        Some((envelope.data, envelope.at))
    }
}

fn age_of(stored_at: Timestamp, now: Timestamp) -> Duration {
    now.signed_duration_since(stored_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::MemoryDurableStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: RecordId,
        tag: String,
    }

    impl CacheRecord for Rec {
        fn record_id(&self) -> RecordId {
            self.id
        }
    }

    fn rec(id: RecordId, tag: &str) -> Rec {
        Rec {
            id,
            tag: tag.to_string(),
        }
    }

    fn page(ids: &[RecordId]) -> CachedPage<Rec> {
        let items: Vec<Rec> = ids.iter().map(|&id| rec(id, "seed")).collect();
        let total = items.len() as u64;
        CachedPage::new(items, 1, 1, total)
    }

    fn config() -> CacheConfig {
        CacheConfig::new()
            .with_memory_ttl(Duration::from_secs(30))
            .with_durable_ttl(Duration::from_secs(3600))
            .with_page_cap(10)
    }

    fn key() -> PartitionKey {
        PartitionKey::new("issue-requests").with("page", 1)
    }

    #[test]
    fn test_miss_on_empty_cache() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        assert!(cache.get(&key(), Utc::now()).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_memory_ttl_boundary() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        let t0 = Utc::now();
        cache.set(&key(), page(&[1]), t0);

        let just_before = t0 + ChronoDuration::seconds(29);
        let hit = cache.get(&key(), just_before).expect("hit");
        assert!(hit.is_fresh());

        let just_after = t0 + ChronoDuration::seconds(31);
        let hit = cache.get(&key(), just_after).expect("hit");
        assert_eq!(hit.freshness(), Freshness::Stale);
    }

    #[test]
    fn test_entry_beyond_durable_ttl_is_absent() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        let t0 = Utc::now();
        cache.set(&key(), page(&[1]), t0);

        let long_after = t0 + ChronoDuration::seconds(3601);
        assert!(cache.get(&key(), long_after).is_none());
    }

    #[test]
    fn test_durable_hydration_after_memory_clear() {
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(MemoryDurableStore::new()));
        let t0 = Utc::now();
        cache.set(&key(), page(&[1, 2]), t0);

        cache.clear_memory();

        let later = t0 + ChronoDuration::seconds(120);
        let hit = cache.get(&key(), later).expect("durable hit");
        assert_eq!(hit.freshness(), Freshness::Stale);
        assert_eq!(hit.page().items.len(), 2);
        assert_eq!(cache.stats().durable_hits, 1);

        // Promoted back into memory: next read is a memory hit.
        let hit = cache.get(&key(), later).expect("memory hit");
        assert_eq!(hit.page().items.len(), 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_durable_ttl_boundary_after_memory_clear() {
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(MemoryDurableStore::new()));
        let t0 = Utc::now();
        cache.set(&key(), page(&[1]), t0);
        cache.clear_memory();

        let beyond = t0 + ChronoDuration::seconds(3601);
        assert!(cache.get(&key(), beyond).is_none());
    }

    #[test]
    fn test_placeholders_never_persisted() {
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(MemoryDurableStore::new()));
        let t0 = Utc::now();
        let mut p = page(&[1]);
        p.upsert_front(rec(-5, "local"), 10);
        cache.set(&key(), p, t0);

        cache.clear_memory();
        let hit = cache.get(&key(), t0).expect("durable hit");
        assert!(!hit.page().contains(-5));
        assert!(hit.page().contains(1));
    }

    #[test]
    fn test_durable_write_failure_degrades_silently() {
        let mut store = MemoryDurableStore::new();
        store.fail_writes(true);
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(store));
        let t0 = Utc::now();

        cache.set(&key(), page(&[1, 2]), t0);

        // Memory tier unaffected.
        let hit = cache.get(&key(), t0).expect("memory hit");
        assert_eq!(hit.page().items.len(), 2);
        assert_eq!(cache.stats().durable_write_failures, 1);

        // After a restart nothing hydrates, which is the degraded mode.
        cache.clear_memory();
        assert!(cache.get(&key(), t0).is_none());
    }

    #[test]
    fn test_mutations_are_noops_for_uncached_keys() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        assert!(!cache.upsert_front(&key(), rec(1, "x")));
        assert!(!cache.replace_by_id(&key(), &rec(1, "x")));
        assert!(!cache.remove_by_id(&key(), 1));
    }

    #[test]
    fn test_mutations_apply_and_write_through() {
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(MemoryDurableStore::new()));
        let t0 = Utc::now();
        cache.set(&key(), page(&[1, 2]), t0);

        assert!(cache.upsert_front(&key(), rec(3, "new")));
        assert!(cache.replace_by_id(&key(), &rec(1, "patched")));
        assert!(cache.remove_by_id(&key(), 2));

        let hit = cache.get(&key(), t0).expect("hit");
        assert_eq!(hit.page().items[0].id, 3);
        assert!(hit.page().contains(1));
        assert!(!hit.page().contains(2));

        // Durable tier saw the same mutations.
        cache.clear_memory();
        let hit = cache.get(&key(), t0).expect("durable hit");
        assert_eq!(hit.page().items[0].id, 3);
        assert!(!hit.page().contains(2));
    }

    #[test]
    fn test_mutation_does_not_reset_freshness() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        let t0 = Utc::now();
        cache.set(&key(), page(&[1]), t0);

        let later = t0 + ChronoDuration::seconds(60);
        assert!(cache.upsert_front(&key(), rec(2, "event")));
        let hit = cache.get(&key(), later).expect("hit");
        // Still stale: event application is not a revalidation.
        assert_eq!(hit.freshness(), Freshness::Stale);
    }

    #[test]
    fn test_apply_matching_filters_by_key() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        let t0 = Utc::now();
        let fy24 = PartitionKey::new("bills").with("financial_year", "2024-25").with("page", 1);
        let fy23 = PartitionKey::new("bills").with("financial_year", "2023-24").with("page", 1);
        cache.set(&fy24, page(&[1]), t0);
        cache.set(&fy23, page(&[2]), t0);

        let touched = cache.apply_matching(
            |key| key.param("financial_year") == Some("2024-25"),
            |_key, page| page.upsert_front(rec(9, "bill"), 10),
        );

        assert_eq!(touched, 1);
        assert!(cache.get(&fy24, t0).expect("hit").page().contains(9));
        assert!(!cache.get(&fy23, t0).expect("hit").page().contains(9));
    }

    #[test]
    fn test_invalidate_clears_both_tiers() {
        let mut cache: TieredPageCache<Rec> =
            TieredPageCache::with_durable(config(), Box::new(MemoryDurableStore::new()));
        let t0 = Utc::now();
        cache.set(&key(), page(&[1]), t0);
        cache.invalidate(&key());
        assert!(cache.get(&key(), t0).is_none());
        cache.clear_memory();
        assert!(cache.get(&key(), t0).is_none());
    }

    #[test]
    fn test_file_store_survives_cache_rebuild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let t0 = Utc::now();

        let mut first: TieredPageCache<Rec> = TieredPageCache::with_durable(
            config(),
            Box::new(crate::durable::JsonFileStore::new(dir.path())),
        );
        first.set(&key(), page(&[1, 2, 3]), t0);
        drop(first);

        // A new process constructs a fresh cache over the same directory.
        let mut second: TieredPageCache<Rec> = TieredPageCache::with_durable(
            config(),
            Box::new(crate::durable::JsonFileStore::new(dir.path())),
        );
        let hit = second.get(&key(), t0 + ChronoDuration::seconds(60)).expect("hydrated");
        assert_eq!(hit.page().items.len(), 3);
        assert_eq!(hit.freshness(), Freshness::Stale);
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut cache: TieredPageCache<Rec> = TieredPageCache::new(config());
        let t0 = Utc::now();
        assert!(cache.get(&key(), t0).is_none());
        cache.set(&key(), page(&[1]), t0);
        assert!(cache.get(&key(), t0).is_some());
        assert!((cache.stats().hit_rate() - 0.5).abs() < 1e-9);
    }
}
