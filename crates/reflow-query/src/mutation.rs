//! Optimistic mutations with guaranteed rollback.
//!
//! Every mutation runs the same seven-step protocol, in strict order:
//! cancel in-flight reads for the affected keys, snapshot them, apply the
//! optimistic write, dispatch the remote call, roll back exactly on
//! failure or apply server-assigned data on success, and always finish by
//! invalidating the affected categories so the next read re-derives truth
//! from the backend.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, trace};

use reflow_cache::{CacheEntry, CacheStore};
use reflow_core::QueryKey;

use crate::backend::RemoteBackend;
use crate::error::QueryError;
use crate::retry::RetryPolicy;

type OptimisticHook = Box<dyn Fn(&CacheStore, &Value) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&CacheStore, &QueryError, &Value) + Send + Sync>;
type SuccessHook = Box<dyn Fn(&CacheStore, &Value, &Value) + Send + Sync>;
type SettleHook = Box<dyn Fn(&CacheStore) + Send + Sync>;
type TransitionHook = Box<dyn Fn(MutationState) + Send + Sync>;

/// Lifecycle of one mutation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Dispatched, outcome unknown.
    Pending,
    /// Remote call resolved.
    Succeeded,
    /// Remote call rejected; rollback applied.
    Failed,
    /// Final: settle-time invalidation issued.
    Settled,
}

/// Per-instance state machine. Each state the mutation reaches,
/// including the initial `Pending`, is reported through the plan's
/// transition observer.
struct Lifecycle {
    state: MutationState,
    observer: Option<TransitionHook>,
}

impl Lifecycle {
    fn new(observer: Option<TransitionHook>) -> Self {
        if let Some(hook) = &observer {
            hook(MutationState::Pending);
        }
        Self {
            state: MutationState::Pending,
            observer,
        }
    }

    fn advance(&mut self, next: MutationState) {
        debug_assert!(
            Self::legal(self.state, next),
            "illegal mutation transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "mutation transition");
        self.state = next;
        if let Some(hook) = &self.observer {
            hook(next);
        }
    }

    fn legal(from: MutationState, to: MutationState) -> bool {
        use MutationState::*;
        matches!(
            (from, to),
            (Pending, Succeeded) | (Pending, Failed) | (Succeeded, Settled) | (Failed, Settled)
        )
    }
}

/// Snapshot of every cache entry a mutation is about to touch.
///
/// Owned solely by the in-flight mutation; consumed on restore, dropped
/// when the mutation settles. Holds full entries (including recorded
/// absence) so a restore reproduces the pre-mutation cache exactly.
pub struct RollbackContext {
    entries: Vec<(QueryKey, Option<CacheEntry>)>,
}

impl RollbackContext {
    /// Capture the current state of `keys` from the store.
    pub fn capture(store: &CacheStore, keys: &[QueryKey]) -> Self {
        let entries = keys
            .iter()
            .map(|key| (key.clone(), store.entry_snapshot(key)))
            .collect();
        Self { entries }
    }

    /// The keys covered by this context.
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Restore every captured entry, exactly. Not a merge: values written
    /// optimistically on top of the snapshot are discarded entirely.
    pub fn restore(self, store: &CacheStore) {
        for (key, snapshot) in self.entries {
            store.restore(&key, snapshot);
        }
    }
}

/// Declarative description of one mutation run.
pub struct MutationPlan {
    mutation: String,
    args: Value,
    affected: Vec<QueryKey>,
    on_optimistic: Option<OptimisticHook>,
    on_error: Option<ErrorHook>,
    on_success: Option<SuccessHook>,
    on_settled: Option<SettleHook>,
    on_transition: Option<TransitionHook>,
}

impl MutationPlan {
    /// Start a plan for a named remote mutation.
    pub fn new(mutation: impl Into<String>) -> Self {
        Self {
            mutation: mutation.into(),
            args: Value::Null,
            affected: Vec::new(),
            on_optimistic: None,
            on_error: None,
            on_success: None,
            on_settled: None,
            on_transition: None,
        }
    }

    /// Set the mutation arguments.
    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Declare a cache key the mutation may touch.
    pub fn affects(mut self, key: QueryKey) -> Self {
        self.affected.push(key);
        self
    }

    /// Declare several affected keys at once.
    pub fn affects_many(mut self, keys: impl IntoIterator<Item = QueryKey>) -> Self {
        self.affected.extend(keys);
        self
    }

    /// Synchronous optimistic cache write, applied before dispatch.
    /// Must not perform I/O.
    pub fn on_optimistic(mut self, hook: impl Fn(&CacheStore, &Value) + Send + Sync + 'static) -> Self {
        self.on_optimistic = Some(Box::new(hook));
        self
    }

    /// Called after rollback when the remote call is rejected. Receives
    /// the error and the original arguments.
    pub fn on_error(
        mut self,
        hook: impl Fn(&CacheStore, &QueryError, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Called on resolution for non-optimistic writes that depend on
    /// server-assigned data. Receives the result and the arguments.
    pub fn on_success(
        mut self,
        hook: impl Fn(&CacheStore, &Value, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Called once the mutation settles, after the reconciling
    /// invalidation, regardless of outcome.
    pub fn on_settled(mut self, hook: impl Fn(&CacheStore) + Send + Sync + 'static) -> Self {
        self.on_settled = Some(Box::new(hook));
        self
    }

    /// Observe every lifecycle state the mutation reaches, in order,
    /// starting with [`MutationState::Pending`].
    pub fn on_transition(mut self, hook: impl Fn(MutationState) + Send + Sync + 'static) -> Self {
        self.on_transition = Some(Box::new(hook));
        self
    }
}

/// Runs mutation plans against the store and backend.
#[derive(Clone)]
pub struct MutationCoordinator {
    store: CacheStore,
    backend: Arc<dyn RemoteBackend>,
    retry: RetryPolicy,
}

impl MutationCoordinator {
    /// Create a coordinator. Mutations retry transient failures at most
    /// once; terminal failures surface immediately.
    pub fn new(store: CacheStore, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            backend,
            retry: RetryPolicy::new(1),
        }
    }

    /// Execute one mutation plan through the full protocol.
    pub async fn run(&self, plan: MutationPlan) -> Result<Value, QueryError> {
        let MutationPlan {
            mutation,
            args,
            affected,
            on_optimistic,
            on_error,
            on_success,
            on_settled,
            on_transition,
        } = plan;
        let mut lifecycle = Lifecycle::new(on_transition);
        debug!(mutation = %mutation, affected = affected.len(), "mutation started");

        // Step 1: cancel in-flight reads so a stale response cannot land
        // on top of the optimistic write. Only reads are cancellable;
        // values already in the store, including other mutations'
        // optimistic writes, stay put.
        for key in &affected {
            self.store.cancel_in_flight(key);
        }

        // Step 2: snapshot into a context owned by this instance alone.
        let rollback = RollbackContext::capture(&self.store, &affected);

        // Step 3: optimistic apply, synchronous.
        if let Some(hook) = &on_optimistic {
            hook(&self.store, &args);
        }

        // Step 4: dispatch.
        let outcome = self.dispatch(&mutation, &args).await;

        let result = match outcome {
            Ok(value) => {
                lifecycle.advance(MutationState::Succeeded);
                // Step 6: writes that need server-assigned data.
                if let Some(hook) = &on_success {
                    hook(&self.store, &value, &args);
                }
                Ok(value)
            }
            Err(err) => {
                lifecycle.advance(MutationState::Failed);
                // Step 5: exact restore, then surface to this caller only.
                rollback.restore(&self.store);
                if let Some(hook) = &on_error {
                    hook(&self.store, &err, &args);
                }
                Err(err)
            }
        };

        // Step 7: reconcile. Invalidate the category of every affected
        // key regardless of outcome; the next read re-derives truth from
        // the backend, which also covers optimistic predictions that were
        // subtly wrong.
        let categories: HashSet<QueryKey> =
            affected.iter().map(QueryKey::category_prefix).collect();
        for category in &categories {
            self.store.invalidate_prefix(category);
        }
        lifecycle.advance(MutationState::Settled);
        if let Some(hook) = &on_settled {
            hook(&self.store);
        }
        debug!(mutation = %mutation, ok = result.is_ok(), "mutation settled");
        result
    }

    async fn dispatch(&self, mutation: &str, args: &Value) -> Result<Value, QueryError> {
        let mut attempt = 0;
        loop {
            match self.backend.invoke_mutation(mutation, args.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.backoff.delay_for_attempt(attempt);
                    debug!(mutation, attempt, error = %err, "retrying mutation");
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use reflow_core::{family, KeyFamily, Params};
    use serde_json::json;
    use std::sync::Mutex;

    const FAVOURITES: KeyFamily = family("favourites");
    const TOOLS: KeyFamily = family("tools");

    fn ids_key() -> QueryKey {
        FAVOURITES.leaf_id("ids", "user-1")
    }

    fn coordinator(backend: &Arc<MockBackend>) -> (MutationCoordinator, CacheStore) {
        let store = CacheStore::new();
        (
            MutationCoordinator::new(store.clone(), backend.clone()),
            store,
        )
    }

    fn toggle_plan(store_key: QueryKey) -> MutationPlan {
        MutationPlan::new("toggleFavourite")
            .args(json!({"toolId": "X"}))
            .affects(store_key.clone())
            .on_optimistic(move |store, args| {
                let mut ids: Vec<String> = store.get(&store_key).unwrap_or_default();
                ids.push(args["toolId"].as_str().unwrap_or_default().to_string());
                let _ = store.set(store_key.clone(), &ids);
            })
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_write_applies_synchronously_and_sticks_on_success() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("toggleFavourite", json!({"ok": true}));
        let (coordinator, store) = coordinator(&backend);
        let key = ids_key();
        store.set(key.clone(), &vec!["1", "2"]).unwrap();

        coordinator.run(toggle_plan(key.clone())).await.unwrap();

        let ids: Vec<String> = store.get(&key).unwrap();
        assert_eq!(ids, ["1", "2", "X"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mutation_rolls_back_exactly_and_fires_error_hook() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("toggleFavourite", Err(QueryError::Remote { status: 403 }));
        let (coordinator, store) = coordinator(&backend);
        let key = ids_key();
        store.set(key.clone(), &vec!["1", "2"]).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let plan = {
            let seen = seen.clone();
            toggle_plan(key.clone()).on_error(move |_, err, args| {
                *seen.lock().unwrap() = Some((err.clone(), args.clone()));
            })
        };

        let result = coordinator.run(plan).await;
        assert_eq!(result, Err(QueryError::Remote { status: 403 }));

        // Reverted to exactly the pre-mutation list, not a merge.
        let ids: Vec<String> = store.get(&key).unwrap();
        assert_eq!(ids, ["1", "2"]);

        let (err, args) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(err, QueryError::Remote { status: 403 });
        assert_eq!(args, json!({"toolId": "X"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_restores_absence() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("toggleFavourite", Err(QueryError::Remote { status: 422 }));
        let (coordinator, store) = coordinator(&backend);
        let key = ids_key();
        // Key absent before the mutation.

        let _ = coordinator.run(toggle_plan(key.clone())).await;
        assert!(store.get_raw(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("toggleFavourite", Err(QueryError::Remote { status: 422 }));
        let (coordinator, _) = coordinator(&backend);

        let result = coordinator.run(toggle_plan(ids_key())).await;
        assert!(result.is_err());
        assert_eq!(backend.mutation_calls("toggleFavourite"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_is_retried_exactly_once() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("toggleFavourite", Err(QueryError::Network("reset".into())));
        backend.enqueue("toggleFavourite", Err(QueryError::Network("reset".into())));
        backend.enqueue("toggleFavourite", Ok(json!({"ok": true})));
        let (coordinator, _) = coordinator(&backend);

        let result = coordinator.run(toggle_plan(ids_key())).await;
        assert_eq!(result, Err(QueryError::Network("reset".into())));
        assert_eq!(backend.mutation_calls("toggleFavourite"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_recovers_on_retry() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("toggleFavourite", Err(QueryError::Network("reset".into())));
        backend.enqueue("toggleFavourite", Ok(json!({"ok": true})));
        let (coordinator, _) = coordinator(&backend);

        let result = coordinator.run(toggle_plan(ids_key())).await;
        assert!(result.is_ok());
        assert_eq!(backend.mutation_calls("toggleFavourite"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_invalidates_affected_categories_on_both_outcomes() {
        for scripted in [Ok(json!({"ok": true})), Err(QueryError::Remote { status: 500 })] {
            let backend = Arc::new(MockBackend::new());
            backend.enqueue("toggleFavourite", scripted.clone());
            if scripted.is_err() {
                // One retry for the transient 500 before surfacing.
                backend.enqueue("toggleFavourite", Err(QueryError::Remote { status: 500 }));
            }
            let (coordinator, store) = coordinator(&backend);
            let key = ids_key();
            store.set(key.clone(), &vec!["1"]).unwrap();

            let _ = coordinator.run(toggle_plan(key.clone())).await;
            assert!(
                store.status(&key).unwrap().stale,
                "affected category must be stale after settle"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_step_discards_stale_read_response() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("toggleFavourite", json!({"ok": true}));
        let (coordinator, store) = coordinator(&backend);
        let key = ids_key();
        store.set(key.clone(), &vec!["1"]).unwrap();

        // A read is in flight when the mutation starts.
        let token = store.begin_fetch(&key);

        coordinator.run(toggle_plan(key.clone())).await.unwrap();

        // The read settles late; its response must not clobber the
        // optimistic write.
        let applied = store.commit_fetch(&key, token, Ok(json!(["1", "server-stale"])));
        assert!(!applied);
        let ids: Vec<String> = store.get(&key).unwrap();
        assert_eq!(ids, ["1", "X"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_step_leaves_other_optimistic_values_alone() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("toggleFavourite", json!({"ok": true}));
        let (coordinator, store) = coordinator(&backend);
        let key = ids_key();

        // Another mutation's optimistic write is already in the cache and
        // is not an in-flight read, so the cancel step must not touch it.
        store.set(key.clone(), &vec!["other-optimistic"]).unwrap();

        coordinator.run(toggle_plan(key.clone())).await.unwrap();
        let ids: Vec<String> = store.get(&key).unwrap();
        assert_eq!(ids, ["other-optimistic", "X"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_fire_in_protocol_order() {
        for (scripted, expected) in [
            (
                Ok(json!({"ok": true})),
                vec!["optimistic", "success", "settled"],
            ),
            (
                Err(QueryError::Remote { status: 404 }),
                vec!["optimistic", "error", "settled"],
            ),
        ] {
            let backend = Arc::new(MockBackend::new());
            backend.enqueue("noop", scripted);
            let (coordinator, _) = coordinator(&backend);

            let log = Arc::new(Mutex::new(Vec::new()));
            let plan = MutationPlan::new("noop")
                .affects(TOOLS.category("list"))
                .on_optimistic({
                    let log = log.clone();
                    move |_, _| log.lock().unwrap().push("optimistic")
                })
                .on_success({
                    let log = log.clone();
                    move |_, _, _| log.lock().unwrap().push("success")
                })
                .on_error({
                    let log = log.clone();
                    move |_, _, _| log.lock().unwrap().push("error")
                })
                .on_settled({
                    let log = log.clone();
                    move |_| log.lock().unwrap().push("settled")
                });

            let _ = coordinator.run(plan).await;
            assert_eq!(*log.lock().unwrap(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_transitions_are_recorded_in_order() {
        use MutationState::*;
        for (scripted, expected) in [
            (Ok(json!({"ok": true})), vec![Pending, Succeeded, Settled]),
            (
                Err(QueryError::Remote { status: 404 }),
                vec![Pending, Failed, Settled],
            ),
        ] {
            let backend = Arc::new(MockBackend::new());
            backend.enqueue("noop", scripted);
            let (coordinator, _) = coordinator(&backend);

            let states = Arc::new(Mutex::new(Vec::new()));
            let plan = MutationPlan::new("noop")
                .affects(TOOLS.category("list"))
                .on_transition({
                    let states = states.clone();
                    move |state| states.lock().unwrap().push(state)
                });

            let _ = coordinator.run(plan).await;
            assert_eq!(*states.lock().unwrap(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_invalidation_covers_every_leaf_of_the_category() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("updateTool", json!({"ok": true}));
        let (coordinator, store) = coordinator(&backend);

        let free = TOOLS.leaf("list", Params::new().set("pricing", "free"));
        let paid = TOOLS.leaf("list", Params::new().set("pricing", "paid"));
        store.set(free.clone(), &json!([1])).unwrap();
        store.set(paid.clone(), &json!([2])).unwrap();

        let plan = MutationPlan::new("updateTool").affects(free.clone());
        coordinator.run(plan).await.unwrap();

        // Invalidation happens at category granularity, reaching sibling
        // leaves under the same [family, operation] prefix.
        assert!(store.status(&free).unwrap().stale);
        assert!(store.status(&paid).unwrap().stale);
    }
}
