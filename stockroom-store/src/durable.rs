//! Durable key-value backing for the page cache.
//!
//! A capability interface: every operation returns a `Result` and the
//! cache treats any failure as "tier unavailable", degrading to
//! memory-only behavior. Nothing here is allowed to panic or to matter
//! for in-memory correctness.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use thiserror::Error;

/// Durable-tier failures. All best-effort; the cache logs and moves on.
#[derive(Debug, Error)]
pub enum DurableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Key-value persistence surface for cached pages.
///
/// Values are opaque strings (the cache stores JSON envelopes). Entries
/// are not proactively swept; the cache applies its durable TTL on read.
pub trait DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, DurableError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), DurableError>;
    fn remove(&mut self, key: &str) -> Result<(), DurableError>;
}

/// File-per-key JSON store under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a durable key to a file path. Keys carry `?`, `&` and `:`;
    /// the slug keeps a readable prefix and the hash keeps it collision
    /// free.
    fn path_for(&self, key: &str) -> PathBuf {
        let slug: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(48)
            .collect();
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.root.join(format!("{}-{:016x}.json", slug, hasher.finish()))
    }
}

impl DurableStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, DurableError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DurableError> {
        if let Some(parent) = self.path_for(key).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), DurableError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests, with write-failure injection to simulate
/// quota exhaustion.
#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    entries: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail, as a full backend would.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DurableStore for MemoryDurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, DurableError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DurableError> {
        if self.fail_writes {
            return Err(DurableError::Backend("quota exceeded".to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), DurableError> {
        self.entries.remove(key);
        Ok(())
    }
}
