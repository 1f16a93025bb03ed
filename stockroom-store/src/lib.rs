//! Stockroom Store - Partitioned Page Cache
//!
//! A generic key -> paginated-page cache with two freshness windows: a
//! short memory TTL (avoid redundant refetches within a session) and a
//! longer durable TTL (hydrate instantly across reloads before
//! revalidating). The durable tier is a best-effort capability; its
//! failures never affect in-memory correctness.
//!
//! Consumers never mutate cached pages directly - only through the three
//! idempotent mutation primitives on [`CachedPage`], which are sufficient
//! to express every create/update/delete reconciliation without a
//! refetch.

pub mod cache;
pub mod durable;
pub mod key;
pub mod page;

pub use cache::{CacheConfig, CacheEntry, CacheHit, CacheStats, Freshness, TieredPageCache};
pub use durable::{DurableError, DurableStore, JsonFileStore, MemoryDurableStore};
pub use key::PartitionKey;
pub use page::{CacheRecord, CachedPage};
