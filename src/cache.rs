use dashmap::DashMap;
use serde_json::Value;
use ulid::Ulid;

/// Keys the engine invalidates after committing a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Per-employee listings (schedule, reservations).
    Employee(Ulid),
    /// Per-customer listings.
    Customer(Ulid),
    /// Paged listing views.
    Listings,
}

/// Cache collaborator. The engine only needs invalidate-after-commit;
/// population and lookup belong to the read side.
pub trait Cache: Send + Sync {
    fn invalidate(&self, key: &CacheKey);
}

/// In-process cache of rendered listing payloads.
pub struct MemoryCache {
    entries: DashMap<CacheKey, Value>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.get(key).map(|e| e.value().clone())
    }
}

impl Cache for MemoryCache {
    fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key);
    }
}
