//! Request hit counters, reset by the report scheduler after every report.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// What the report scheduler needs from the metrics collaborator.
pub trait HitMetrics: Send + Sync {
    fn reset_hits(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Books,
    Authors,
    Customers,
    Orders,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Books,
        Resource::Authors,
        Resource::Customers,
        Resource::Orders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Books => "books",
            Resource::Authors => "authors",
            Resource::Customers => "customers",
            Resource::Orders => "orders",
        }
    }

    /// Resource addressed by a request path such as `/books/3`.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| path.trim_start_matches('/').starts_with(r.as_str()))
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-resource hit counters shared by request handlers.
#[derive(Debug, Default)]
pub struct ApiHits {
    counters: [AtomicU64; 4],
}

impl ApiHits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: Resource) {
        self.counters[resource.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Counts the hit if the path belongs to a tracked resource.
    pub fn record_path(&self, path: &str) -> bool {
        match Resource::from_path(path) {
            Some(resource) => {
                self.record(resource);
                true
            }
            None => false,
        }
    }

    pub fn hits(&self, resource: Resource) -> u64 {
        self.counters[resource.index()].load(Ordering::Relaxed)
    }

    pub fn all_hits(&self) -> BTreeMap<&'static str, u64> {
        Resource::ALL
            .into_iter()
            .map(|r| (r.as_str(), self.hits(r)))
            .collect()
    }
}

impl HitMetrics for ApiHits {
    fn reset_hits(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_counted_per_resource_and_reset() {
        let hits = ApiHits::new();
        assert!(hits.record_path("/books"));
        assert!(hits.record_path("/books/12"));
        assert!(hits.record_path("orders/3/cancel"));
        assert!(!hits.record_path("/reports/latest"));

        assert_eq!(hits.hits(Resource::Books), 2);
        assert_eq!(hits.all_hits().get("orders"), Some(&1));
        assert_eq!(hits.all_hits().get("authors"), Some(&0));

        hits.reset_hits();
        assert!(hits.all_hits().values().all(|&n| n == 0));
    }
}
