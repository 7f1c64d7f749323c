//! Cache entries and their freshness metadata.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Stored value plus freshness metadata for one key.
///
/// Entries are owned exclusively by the [`CacheStore`](crate::CacheStore);
/// the only second copy that ever exists lives inside a mutation's
/// rollback context, which is why the type is `Clone` and `PartialEq`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub(crate) value: Option<Value>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) is_fetching: bool,
    pub(crate) error: Option<String>,
    /// Forced-stale flag set by invalidation, independent of age.
    pub(crate) stale: bool,
    /// Fetch epoch; bumped by cancellation so a late response is ignored.
    pub(crate) epoch: u64,
    pub(crate) last_observed: Instant,
}

impl CacheEntry {
    pub(crate) fn empty(now: Instant) -> Self {
        Self {
            value: None,
            fetched_at: None,
            is_fetching: false,
            error: None,
            stale: false,
            epoch: 0,
            last_observed: now,
        }
    }

    /// The cached value, if one has ever been stored.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The last fetch error stored on this entry.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a fetch for this entry is in flight.
    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Age since the last successful fetch.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.fetched_at.map(|at| now.saturating_duration_since(at))
    }

    /// Whether the entry is servable without a refetch under `stale_after`.
    pub fn is_fresh(&self, stale_after: Duration, now: Instant) -> bool {
        if self.value.is_none() || self.stale {
            return false;
        }
        match self.age(now) {
            Some(age) => age <= stale_after,
            None => false,
        }
    }
}

/// Read-only view of an entry's metadata, surfaced to UI readers.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryStatus {
    /// Whether any value is cached.
    pub has_value: bool,
    /// Whether a fetch is currently in flight.
    pub is_fetching: bool,
    /// Whether the entry has been marked stale by invalidation.
    pub stale: bool,
    /// The last fetch error, if any.
    pub error: Option<String>,
    /// Age since the last successful fetch.
    pub age: Option<Duration>,
}
