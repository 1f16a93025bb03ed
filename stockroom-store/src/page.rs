//! Cached pages and the idempotent mutation primitives.
//!
//! These three primitives (`upsert_front`, `replace_by_id`,
//! `remove_by_id`) are the ONLY way cached pages change outside a full
//! `set`. All three tolerate duplicate application, which is what makes
//! redelivered push events safe.

use serde::{de::DeserializeOwned, Serialize};
use stockroom_core::{
    is_placeholder_id, Bill, EquipmentItem, Handout, IssueRequest, RecordId,
};

/// Marker trait for record types the page cache can hold.
///
/// `record_id` drives id-based mutation and durable-tier placeholder
/// filtering. Implementations must be `Clone`, `Serialize` and
/// `DeserializeOwned` so pages can round-trip the durable tier.
pub trait CacheRecord: Clone + Serialize + DeserializeOwned {
    /// The record's identifier; negative for local placeholders.
    fn record_id(&self) -> RecordId;

    /// True for locally-synthesized records that must never persist.
    fn is_placeholder(&self) -> bool {
        is_placeholder_id(self.record_id())
    }
}

impl CacheRecord for IssueRequest {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for EquipmentItem {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for Bill {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for Handout {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

/// One cached page of a partitioned collection.
///
/// Items keep server-defined order. Owned by the store; consumers read
/// it and issue mutations through the primitives below.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CachedPage<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl<T> CachedPage<T> {
    pub fn new(items: Vec<T>, page: u32, total_pages: u32, total: u64) -> Self {
        Self {
            items,
            page,
            total_pages,
            total,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 1, 0, 0)
    }
}

impl<T: CacheRecord> CachedPage<T> {
    pub fn contains(&self, id: RecordId) -> bool {
        self.items.iter().any(|item| item.record_id() == id)
    }

    /// Prepend `record`, dropping any prior copy with the same id and
    /// truncating to `cap` items. `total` grows only when the id was not
    /// already present, so an update redelivered as an insert is never
    /// double-counted.
    pub fn upsert_front(&mut self, record: T, cap: usize) {
        let id = record.record_id();
        let existed = self.contains(id);
        self.items.retain(|item| item.record_id() != id);
        self.items.insert(0, record);
        self.items.truncate(cap);
        if !existed {
            self.total = self.total.saturating_add(1);
        }
    }

    /// Replace the item with the same id in place. Never inserts;
    /// returns false when the id is not on this page.
    pub fn replace_by_id(&mut self, record: &T) -> bool {
        let id = record.record_id();
        match self.items.iter_mut().find(|item| item.record_id() == id) {
            Some(existing) => {
                *existing = record.clone();
                true
            }
            None => false,
        }
    }

    /// Remove the item with `id`, decrementing `total` floored at zero.
    /// Returns false when the id is not on this page.
    pub fn remove_by_id(&mut self, id: RecordId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.record_id() != id);
        let removed = self.items.len() < before;
        if removed {
            self.total = self.total.saturating_sub(1);
        }
        removed
    }

    /// Copy of this page without placeholder records, for the durable
    /// tier. `total` is reduced by the placeholders dropped.
    pub fn without_placeholders(&self) -> Self {
        let items: Vec<T> = self
            .items
            .iter()
            .filter(|item| !item.is_placeholder())
            .cloned()
            .collect();
        let dropped = (self.items.len() - items.len()) as u64;
        Self {
            items,
            page: self.page,
            total_pages: self.total_pages,
            total: self.total.saturating_sub(dropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_upsert_front_inserts_new_at_front() {
        let mut p = page(&[1, 2]);
        p.upsert_front(rec(3, "new"), 10);
        assert_eq!(p.items[0].id, 3);
        assert_eq!(p.items.len(), 3);
        assert_eq!(p.total, 3);
    }

    #[test]
    fn test_upsert_front_update_does_not_double_count() {
        let mut p = page(&[1, 2]);
        p.upsert_front(rec(2, "moved"), 10);
        assert_eq!(p.items.len(), 2);
        assert_eq!(p.total, 2);
        assert_eq!(p.items[0].id, 2);
        assert_eq!(p.items[0].tag, "moved");
    }

    #[test]
    fn test_upsert_front_truncates_to_cap() {
        let mut p = page(&[1, 2, 3]);
        p.upsert_front(rec(4, "new"), 3);
        assert_eq!(p.items.len(), 3);
        assert_eq!(p.items[0].id, 4);
        assert!(!p.contains(3));
        // total still counts the collection, not the visible window
        assert_eq!(p.total, 4);
    }

    #[test]
    fn test_upsert_front_idempotent() {
        let mut once = page(&[1, 2]);
        once.upsert_front(rec(5, "x"), 10);
        let mut twice = page(&[1, 2]);
        twice.upsert_front(rec(5, "x"), 10);
        twice.upsert_front(rec(5, "x"), 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_by_id_in_place() {
        let mut p = page(&[1, 2, 3]);
        assert!(p.replace_by_id(&rec(2, "patched")));
        assert_eq!(p.items[1].tag, "patched");
        assert_eq!(p.items.len(), 3);
        assert_eq!(p.total, 3);
    }

    #[test]
    fn test_replace_by_id_never_inserts() {
        let mut p = page(&[1]);
        assert!(!p.replace_by_id(&rec(9, "ghost")));
        assert_eq!(p.items.len(), 1);
        assert_eq!(p.total, 1);
    }

    #[test]
    fn test_remove_by_id_decrements_total() {
        let mut p = page(&[1, 2]);
        assert!(p.remove_by_id(1));
        assert_eq!(p.items.len(), 1);
        assert_eq!(p.total, 1);
    }

    #[test]
    fn test_remove_by_id_total_floors_at_zero() {
        let mut p = CachedPage::new(vec![rec(1, "only")], 1, 1, 0);
        assert!(p.remove_by_id(1));
        assert_eq!(p.total, 0);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut p = page(&[1, 2]);
        assert!(!p.remove_by_id(42));
        assert_eq!(p.items.len(), 2);
        assert_eq!(p.total, 2);
    }

    #[test]
    fn test_without_placeholders_drops_negative_ids() {
        let mut p = page(&[1, 2]);
        p.upsert_front(rec(-7, "local"), 10);
        let persisted = p.without_placeholders();
        assert!(!persisted.contains(-7));
        assert_eq!(persisted.items.len(), 2);
        assert_eq!(persisted.total, 2);
        // original untouched
        assert!(p.contains(-7));
    }
}
