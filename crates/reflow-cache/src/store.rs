//! The shared key→entry cache store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use reflow_core::QueryKey;

use crate::entry::{CacheEntry, EntryStatus};
use crate::error::CacheError;
use crate::policy::{FreshnessPolicy, PolicyTable};

/// The single shared cache of query results, keyed by [`QueryKey`].
///
/// Cheap to clone (all clones share one map). Short, synchronous critical
/// sections only; no lock is ever held across an await point. Writes from
/// outside this layer (live push updates) are treated as authoritative:
/// a `set` replaces the entry's value and resets its freshness, whoever
/// the writer is.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    map: RwLock<HashMap<QueryKey, CacheEntry>>,
    /// Signalled whenever a fetch settles or is cancelled, so concurrent
    /// readers waiting on an in-flight fetch can re-check the entry.
    changed: tokio::sync::Notify,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.inner.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.inner.map.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the cached value for a key, deserialized into `T`.
    ///
    /// Touches the entry's observation timestamp, deferring eviction.
    /// Returns `None` on a miss or when the cached shape does not match;
    /// use [`try_get`](Self::try_get) to surface the mismatch instead.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                trace!(key = %key, error = %err, "cached value does not decode");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but a cached value that does not decode
    /// into `T` is an error rather than a silent miss.
    pub fn try_get<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, CacheError> {
        let value = {
            let mut map = self.write();
            let Some(entry) = map.get_mut(key) else {
                return Ok(None);
            };
            entry.last_observed = Instant::now();
            match entry.value.clone() {
                Some(value) => value,
                None => return Ok(None),
            }
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| CacheError::Deserialization(err.to_string()))
    }

    /// Get the raw cached value for a key without decoding.
    pub fn get_raw(&self, key: &QueryKey) -> Option<Value> {
        self.read().get(key).and_then(|e| e.value.clone())
    }

    /// Store a value under a key, marking it freshly fetched.
    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_value(value)?;
        self.set_raw(key, raw);
        Ok(())
    }

    /// Store a raw value under a key, marking it freshly fetched.
    pub fn set_raw(&self, key: QueryKey, value: Value) {
        let now = Instant::now();
        {
            let mut map = self.write();
            let entry = map.entry(key).or_insert_with(|| CacheEntry::empty(now));
            entry.value = Some(value);
            entry.fetched_at = Some(now);
            entry.stale = false;
            entry.error = None;
            entry.last_observed = now;
        }
        self.inner.changed.notify_waiters();
    }

    /// Metadata view of an entry, for UI read results.
    pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        let map = self.read();
        let entry = map.get(key)?;
        Some(EntryStatus {
            has_value: entry.value.is_some(),
            is_fetching: entry.is_fetching,
            stale: entry.stale,
            error: entry.error.clone(),
            age: entry.age(Instant::now()),
        })
    }

    /// Whether the entry under `key` is fresh per `policy`.
    pub fn is_fresh(&self, key: &QueryKey, policy: &FreshnessPolicy) -> bool {
        self.read()
            .get(key)
            .map(|e| e.is_fresh(policy.stale_after, Instant::now()))
            .unwrap_or(false)
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.read().get(key).map(|e| e.is_fetching).unwrap_or(false)
    }

    /// Mark every entry under `prefix` stale. Idempotent: invalidating an
    /// already-stale or absent key is a no-op, never an error.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut marked = 0;
        {
            let mut map = self.write();
            for (key, entry) in map.iter_mut() {
                if prefix.is_prefix_of(key) && !entry.stale {
                    entry.stale = true;
                    marked += 1;
                }
            }
        }
        if marked > 0 {
            debug!(prefix = %prefix, marked, "invalidated cache prefix");
        }
        marked
    }

    /// Cancel in-flight fetches for every entry under `prefix`.
    ///
    /// Cancellation means "ignore the eventual response": the entry's
    /// fetch epoch is bumped so a pending [`commit_fetch`](Self::commit_fetch)
    /// with the old token is discarded. Values already in the cache,
    /// including other mutations' optimistic writes, are untouched.
    pub fn cancel_in_flight(&self, prefix: &QueryKey) -> usize {
        let mut cancelled = 0;
        {
            let mut map = self.write();
            for (key, entry) in map.iter_mut() {
                if prefix.is_prefix_of(key) && entry.is_fetching {
                    entry.epoch += 1;
                    entry.is_fetching = false;
                    cancelled += 1;
                }
            }
        }
        if cancelled > 0 {
            trace!(prefix = %prefix, cancelled, "cancelled in-flight reads");
            self.inner.changed.notify_waiters();
        }
        cancelled
    }

    /// Mark a fetch as started and return the epoch token that a later
    /// [`commit_fetch`](Self::commit_fetch) must present.
    pub fn begin_fetch(&self, key: &QueryKey) -> u64 {
        let now = Instant::now();
        let mut map = self.write();
        let entry = map
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::empty(now));
        entry.is_fetching = true;
        entry.epoch
    }

    /// Settle a fetch started with [`begin_fetch`](Self::begin_fetch).
    ///
    /// The outcome is applied only when the token still matches the
    /// entry's epoch; a cancelled fetch's response is silently dropped.
    /// Returns whether the outcome was applied.
    pub fn commit_fetch(
        &self,
        key: &QueryKey,
        token: u64,
        outcome: Result<Value, String>,
    ) -> bool {
        let applied = {
            let mut map = self.write();
            match map.get_mut(key) {
                Some(entry) if entry.epoch == token => {
                    entry.is_fetching = false;
                    match outcome {
                        Ok(value) => {
                            let now = Instant::now();
                            entry.value = Some(value);
                            entry.fetched_at = Some(now);
                            entry.stale = false;
                            entry.error = None;
                            entry.last_observed = now;
                        }
                        Err(message) => {
                            entry.error = Some(message);
                        }
                    }
                    true
                }
                _ => false,
            }
        };
        if applied {
            trace!(key = %key, "fetch settled");
        } else {
            trace!(key = %key, "stale fetch response ignored");
        }
        self.inner.changed.notify_waiters();
        applied
    }

    /// Full snapshot of one entry, for rollback contexts. `None` records
    /// that the key was absent, so a restore can reproduce the absence.
    pub fn entry_snapshot(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    /// Restore an entry captured by [`entry_snapshot`](Self::entry_snapshot).
    ///
    /// An exact replacement, not a merge: the whole pre-mutation entry
    /// comes back, and a key that was absent becomes absent again.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<CacheEntry>) {
        {
            let mut map = self.write();
            match snapshot {
                Some(entry) => {
                    map.insert(key.clone(), entry);
                }
                None => {
                    map.remove(key);
                }
            }
        }
        self.inner.changed.notify_waiters();
    }

    /// Every cached key extending `prefix`.
    pub fn keys_with_prefix(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.read()
            .keys()
            .filter(|key| prefix.is_prefix_of(key))
            .cloned()
            .collect()
    }

    /// Evict entries unobserved for longer than their policy's evict
    /// window. Returns the number of entries removed.
    pub fn sweep(&self, policies: &PolicyTable) -> usize {
        let now = Instant::now();
        let mut map = self.write();
        let before = map.len();
        map.retain(|key, entry| {
            if entry.is_fetching {
                return true;
            }
            let evict_after = policies.resolve(key).evict_after;
            now.saturating_duration_since(entry.last_observed) <= evict_after
        });
        let evicted = before - map.len();
        if evicted > 0 {
            debug!(evicted, "swept unobserved cache entries");
        }
        evicted
    }

    /// Drop every entry. Used on sign-out; the store itself lives on.
    pub fn clear(&self) {
        self.write().clear();
        self.inner.changed.notify_waiters();
        debug!("cache cleared");
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// A future that resolves when any fetch settles or is cancelled.
    ///
    /// Used by readers that found a fetch already in flight for their key
    /// and want to piggyback on it instead of issuing a duplicate call.
    /// Obtain the future *before* re-checking the entry so a settle
    /// between check and await is not missed.
    pub fn changed(&self) -> tokio::sync::futures::Notified<'_> {
        self.inner.changed.notified()
    }

    /// Diagnostic dump of the full store state.
    ///
    /// Intended for tests that assert exact-restore properties.
    pub fn export(&self) -> HashMap<QueryKey, CacheEntry> {
        self.read().clone()
    }
}
