//! Cache-aware query client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, trace};

use reflow_cache::{CacheStore, PolicyTable};
use reflow_core::QueryKey;

use crate::backend::RemoteBackend;
use crate::error::QueryError;
use crate::retry::RetryPolicy;

/// What a UI reader sees for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult<T> {
    /// The cached value, if any (possibly stale).
    pub data: Option<T>,
    /// True while there is no data yet and a fetch is in flight.
    pub is_loading: bool,
    /// True while any fetch for the key is in flight.
    pub is_fetching: bool,
    /// The last fetch error stored on the entry.
    pub error: Option<String>,
}

/// Client for cache-first reads and background prefetches.
///
/// Cheap to clone; all clones share the same store, policy table and
/// backend handle.
#[derive(Clone)]
pub struct QueryClient {
    store: CacheStore,
    policies: Arc<PolicyTable>,
    backend: Arc<dyn RemoteBackend>,
}

impl QueryClient {
    /// Create a client over a shared store and backend.
    pub fn new(store: CacheStore, policies: Arc<PolicyTable>, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            policies,
            backend,
        }
    }

    /// The shared cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The policy table in effect.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Read a key, fetching from the backend when the entry is missing or
    /// stale (or when the key's class revalidates on mount).
    ///
    /// When another read already has a fetch in flight for the same key,
    /// this call waits for that fetch to settle instead of issuing a
    /// duplicate remote call.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        query: &str,
        args: Value,
    ) -> ReadResult<T> {
        let policy = self.policies.resolve(key);
        let fresh = self.store.is_fresh(key, policy);

        if fresh && !policy.refetch_on_mount {
            trace!(key = %key, "fresh cache hit");
            return self.snapshot(key);
        }

        if self.store.is_fetching(key) {
            self.wait_for_settle(key).await;
            return self.snapshot(key);
        }

        let retry = RetryPolicy::for_reads(policy);
        // The outcome also lands on the cache entry; readers of the same
        // key observe it from there.
        let _ = self.fetch_with_retry(key, query, args, &retry).await;
        self.snapshot(key)
    }

    /// Fetch a key unconditionally with the key's read retry policy,
    /// committing the outcome to the store and returning it.
    pub async fn fetch(&self, key: &QueryKey, query: &str, args: Value) -> Result<Value, QueryError> {
        let retry = RetryPolicy::for_reads(self.policies.resolve(key));
        self.fetch_with_retry(key, query, args, &retry).await
    }

    /// Issue a low-priority background read for a key.
    ///
    /// A no-op when the entry is already fresh or a fetch is in flight.
    /// Never retried; failures are only traced, a missed prefetch is
    /// cheap to redo.
    pub async fn prefetch(&self, key: &QueryKey, query: &str, args: Value) {
        let policy = self.policies.resolve(key);
        if self.store.is_fresh(key, policy) {
            trace!(key = %key, "prefetch skipped, entry fresh");
            return;
        }
        if self.store.is_fetching(key) {
            trace!(key = %key, "prefetch skipped, fetch in flight");
            return;
        }
        if let Err(err) = self
            .fetch_with_retry(key, query, args, &RetryPolicy::none())
            .await
        {
            trace!(key = %key, error = %err, "prefetch failed");
        }
    }

    /// Mark every entry under `prefix` stale.
    pub fn invalidate(&self, prefix: &QueryKey) {
        self.store.invalidate_prefix(prefix);
    }

    /// Spawn a periodic background refetch for a key whose class polls
    /// on an interval.
    ///
    /// Returns `None` when the key's policy sets no interval. Abort the
    /// returned handle when the polled view unmounts.
    pub fn spawn_interval_refetch(
        &self,
        key: QueryKey,
        query: impl Into<String>,
        args: Value,
    ) -> Option<tokio::task::AbortHandle> {
        let interval = self.policies.resolve(&key).refetch_interval?;
        let client = self.clone();
        let query = query.into();
        // First tick is measured from the spawn call, not from when the
        // task is first polled.
        let mut deadline = Instant::now() + interval;
        let task = tokio::spawn(async move {
            loop {
                sleep_until(deadline).await;
                if let Err(err) = client.fetch(&key, &query, args.clone()).await {
                    trace!(key = %key, error = %err, "interval refetch failed");
                }
                deadline += interval;
            }
        });
        Some(task.abort_handle())
    }

    async fn wait_for_settle(&self, key: &QueryKey) {
        loop {
            let changed = self.store.changed();
            if !self.store.is_fetching(key) {
                return;
            }
            changed.await;
        }
    }

    async fn fetch_with_retry(
        &self,
        key: &QueryKey,
        query: &str,
        args: Value,
        retry: &RetryPolicy,
    ) -> Result<Value, QueryError> {
        let token = self.store.begin_fetch(key);
        let mut attempt = 0;
        let outcome = loop {
            match self.backend.invoke_query(query, args.clone()).await {
                Ok(value) => break Ok(value),
                Err(err) if retry.should_retry(&err, attempt) => {
                    let delay = retry.backoff.delay_for_attempt(attempt);
                    debug!(key = %key, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying read");
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };
        self.store
            .commit_fetch(key, token, outcome.clone().map_err(|e| e.to_string()));
        outcome
    }

    fn snapshot<T: DeserializeOwned>(&self, key: &QueryKey) -> ReadResult<T> {
        let data = self.store.get::<T>(key);
        let status = self.store.status(key);
        let (is_fetching, error) = match status {
            Some(s) => (s.is_fetching, s.error),
            None => (false, None),
        };
        ReadResult {
            is_loading: data.is_none() && is_fetching,
            data,
            is_fetching,
            error,
        }
    }
}
