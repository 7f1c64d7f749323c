//! The facade over the whole sync stack.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use reflow_cache::{CacheStore, PolicyTable};
use reflow_core::{KeyFamily, Params, QueryKey};
use reflow_paginate::{InfiniteQuery, PagedQuery};
use reflow_prefetch::{HoverPrefetcher, ProximityNotifier, SectionPrefetcher};
use reflow_query::{
    MutationCoordinator, MutationPlan, QueryClient, QueryError, ReadResult, RemoteBackend,
};

use crate::config::SyncConfig;

/// One synchronization layer instance: a shared cache store with the
/// query client, mutation coordinator, pagination mergers, and prefetch
/// triggers wired over it.
///
/// Construct one per signed-in session and share it; everything inside
/// is cheap to clone or hand out by reference.
pub struct SyncLayer {
    store: CacheStore,
    policies: Arc<PolicyTable>,
    client: QueryClient,
    coordinator: MutationCoordinator,
    hover: HoverPrefetcher,
    config: SyncConfig,
}

impl SyncLayer {
    /// Wire a layer over a backend with the given policy table.
    pub fn new(backend: Arc<dyn RemoteBackend>, policies: PolicyTable, config: SyncConfig) -> Self {
        let store = CacheStore::new();
        let policies = Arc::new(policies);
        let client = QueryClient::new(store.clone(), policies.clone(), backend.clone());
        let coordinator = MutationCoordinator::new(store.clone(), backend);
        let hover = HoverPrefetcher::with_delay(client.clone(), config.hover_delay);
        Self {
            store,
            policies,
            client,
            coordinator,
            hover,
            config,
        }
    }

    /// The shared cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The underlying query client, for code that composes its own reads.
    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    /// Cache-first read of one key.
    pub async fn read<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        query: &str,
        args: Value,
    ) -> ReadResult<T> {
        self.client.read(key, query, args).await
    }

    /// Unconditional fetch of one key.
    pub async fn fetch(&self, key: &QueryKey, query: &str, args: Value) -> Result<Value, QueryError> {
        self.client.fetch(key, query, args).await
    }

    /// Low-priority background read of one key.
    pub async fn prefetch(&self, key: &QueryKey, query: &str, args: Value) {
        self.client.prefetch(key, query, args).await;
    }

    /// Mark every entry under a prefix stale.
    pub fn invalidate(&self, prefix: &QueryKey) {
        self.client.invalidate(prefix);
    }

    /// Run one mutation through the optimistic protocol.
    pub async fn mutate(&self, plan: MutationPlan) -> Result<Value, QueryError> {
        self.coordinator.run(plan).await
    }

    /// A cursor-based infinite list, capped at the configured page count.
    pub fn infinite<T: DeserializeOwned>(
        &self,
        family: KeyFamily,
        operation: impl Into<String>,
        query_name: impl Into<String>,
        filters: Params,
    ) -> InfiniteQuery<T> {
        InfiniteQuery::new(self.client.clone(), family, operation, query_name, filters)
            .with_max_pages(self.config.max_retained_pages)
    }

    /// An offset-based page navigator with the configured page size.
    pub fn paged<T: DeserializeOwned>(
        &self,
        family: KeyFamily,
        operation: impl Into<String>,
        query_name: impl Into<String>,
        filters: Params,
    ) -> PagedQuery<T> {
        PagedQuery::new(
            self.client.clone(),
            family,
            operation,
            query_name,
            filters,
            self.config.page_size,
        )
    }

    /// Pointer entered an item: arm the hover prefetch timer.
    pub fn hover_enter(&self, key: QueryKey, query: impl Into<String>, args: Value) {
        self.hover.pointer_enter(key, query, args);
    }

    /// Pointer left: cancel the pending hover prefetch, if any.
    pub fn hover_leave(&self) {
        self.hover.pointer_leave();
    }

    /// A section prefetcher bound to the host's proximity notifier, using
    /// the configured threshold.
    pub fn section_prefetcher(&self, notifier: Arc<dyn ProximityNotifier>) -> SectionPrefetcher {
        SectionPrefetcher::with_threshold(
            self.client.clone(),
            notifier,
            self.config.proximity_threshold_px,
        )
    }

    /// Connectivity returned: mark every cached key whose class
    /// revalidates on reconnect as stale, so the next read refetches.
    pub fn reconnected(&self) {
        let everything = QueryKey::from_segments(Vec::new());
        let mut marked = 0usize;
        for key in self.store.keys_with_prefix(&everything) {
            if self.policies.resolve(&key).refetch_on_reconnect {
                marked += self.store.invalidate_prefix(&key);
            }
        }
        debug!(marked, "reconnect revalidation");
    }

    /// Evict entries nobody has observed for longer than their class's
    /// evict window. Returns the number of entries dropped.
    pub fn sweep(&self) -> usize {
        self.store.sweep(&self.policies)
    }

    /// Drop every cached entry. Called on sign-out so one account's data
    /// never leaks into the next session.
    pub fn sign_out(&self) {
        debug!(entries = self.store.len(), "clearing cache on sign-out");
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_cache::{DataClass, PolicyTable};
    use reflow_core::family;
    use reflow_query::testing::MockBackend;
    use serde_json::json;

    const TOOLS: reflow_core::KeyFamily = family("tools");
    const FAVOURITES: reflow_core::KeyFamily = family("favourites");

    fn layer(backend: &Arc<MockBackend>) -> SyncLayer {
        let policies = PolicyTable::new().map_family("favourites", DataClass::UserScoped);
        SyncLayer::new(backend.clone(), policies, SyncConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_empties_the_store() {
        let backend = Arc::new(MockBackend::new());
        let layer = layer(&backend);
        layer.store().set_raw(TOOLS.leaf_id("detail", "a"), json!({}));
        layer
            .store()
            .set_raw(FAVOURITES.leaf_id("ids", "alice"), json!(["1"]));

        layer.sign_out();

        assert!(layer.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_marks_only_reconnect_classes_stale() {
        let backend = Arc::new(MockBackend::new());
        let layer = layer(&backend);
        let detail = TOOLS.leaf_id("detail", "a");
        let ids = FAVOURITES.leaf_id("ids", "alice");
        layer.store().set_raw(detail.clone(), json!({}));
        layer.store().set_raw(ids.clone(), json!(["1"]));

        layer.reconnected();

        assert!(layer.store().status(&ids).is_some_and(|s| s.stale));
        assert!(layer.store().status(&detail).is_some_and(|s| !s.stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_and_invalidate_round_trip() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("getTool", json!({"slug": "a"}));
        let layer = layer(&backend);
        let key = TOOLS.leaf_id("detail", "a");

        let first: ReadResult<Value> = layer.read(&key, "getTool", json!({"slug": "a"})).await;
        assert!(first.data.is_some());
        assert_eq!(backend.query_calls("getTool"), 1);

        // Fresh: served from cache.
        let _: ReadResult<Value> = layer.read(&key, "getTool", json!({"slug": "a"})).await;
        assert_eq!(backend.query_calls("getTool"), 1);

        layer.invalidate(&TOOLS.category("detail"));
        let _: ReadResult<Value> = layer.read(&key, "getTool", json!({"slug": "a"})).await;
        assert_eq!(backend.query_calls("getTool"), 2);
    }
}
