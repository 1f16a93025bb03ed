//! Normalized partition keys for cached pages.
//!
//! A key is a logical resource name plus its partition parameters
//! (page, page size, fiscal year, free-text filter, ...). Parameters are
//! kept in a sorted map, so two keys built with the same parameters in
//! any insertion order are equal and encode identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one cached page of one partitioned collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    resource: String,
    params: BTreeMap<String, String>,
}

impl PartitionKey {
    /// Create a key for a resource with no partition parameters yet.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a partition parameter. Later values for the same name win.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Look up one partition parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All partition parameters in sorted order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The page number parameter, when present and numeric.
    pub fn page(&self) -> Option<u32> {
        self.param("page").and_then(|p| p.parse().ok())
    }

    /// True for keys addressing the first page of their partition.
    ///
    /// A key with no `page` parameter addresses an unpaginated view and
    /// counts as first-page for insertion purposes.
    pub fn is_first_page(&self) -> bool {
        self.page().map(|p| p <= 1).unwrap_or(true)
    }

    /// Canonical string form: `resource?k1=v1&k2=v2` (params sorted).
    pub fn encode(&self) -> String {
        if self.params.is_empty() {
            return self.resource.clone();
        }
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.resource, query.join("&"))
    }

    /// Key used in the durable tier: `<resource>:persist:<encoded-key>`.
    pub fn durable_key(&self) -> String {
        format!("{}:persist:{}", self.resource, self.encode())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
