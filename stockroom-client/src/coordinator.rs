//! Revalidation de-duplication.
//!
//! Guarantees at most one outstanding network fetch per partition key:
//! a second `begin` for a key already in flight reports false and the
//! caller attaches to the existing fetch by doing nothing. Nothing is
//! cancelled; `finish` clears the slot when the fetch message comes
//! back, success or not.

use std::collections::HashSet;
use stockroom_store::PartitionKey;

#[derive(Debug, Default)]
pub struct RevalidationCoordinator {
    in_flight: HashSet<PartitionKey>,
}

impl RevalidationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the key for a fetch. False means one is already outstanding.
    pub fn begin(&mut self, key: &PartitionKey) -> bool {
        self.in_flight.insert(key.clone())
    }

    /// Release the key once its fetch resolved.
    pub fn finish(&mut self, key: &PartitionKey) -> bool {
        self.in_flight.remove(key)
    }

    pub fn is_in_flight(&self, key: &PartitionKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }
}
