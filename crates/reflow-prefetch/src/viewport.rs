//! Viewport-proximity prefetching for section boundaries.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::trace;

use reflow_core::QueryKey;
use reflow_query::QueryClient;

/// Opaque handle for a rendered element watched for proximity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host-side geometry source.
///
/// The rendering host owns layout and scroll position, so it decides
/// when an element comes within `threshold_px` of the viewport edge and
/// invokes the registered callback. A callback may fire more than once
/// for the same element; the prefetcher deduplicates on its side.
pub trait ProximityNotifier: Send + Sync {
    /// Watch `element` and invoke `on_near` whenever it comes within
    /// `threshold_px` of the visible area.
    fn register(&self, element: ElementId, threshold_px: u32, on_near: Box<dyn Fn() + Send + Sync>);

    /// Stop watching `element`.
    fn unregister(&self, element: &ElementId);
}

/// Unregisters its element from the notifier when dropped.
///
/// Hold the guard for as long as the observed section is rendered;
/// dropping it (e.g. on unmount) tears the observation down.
#[must_use = "dropping the guard immediately cancels the observation"]
pub struct ObservationGuard {
    notifier: Arc<dyn ProximityNotifier>,
    element: ElementId,
}

impl Drop for ObservationGuard {
    fn drop(&mut self) {
        self.notifier.unregister(&self.element);
    }
}

/// Prefetches the next section's list as the user scrolls toward it.
///
/// Each observed section element is bound to the query key of the
/// category that follows it on screen. When the section nears the
/// viewport, that key is read once in the background; further proximity
/// events for the same element are ignored, so a section fires at most
/// one prefetch no matter how often the user scrolls across it.
pub struct SectionPrefetcher {
    client: QueryClient,
    notifier: Arc<dyn ProximityNotifier>,
    threshold_px: u32,
    fired: Arc<Mutex<HashSet<ElementId>>>,
}

impl SectionPrefetcher {
    /// Default distance from the viewport edge at which to fire.
    pub const DEFAULT_THRESHOLD_PX: u32 = 300;

    /// Create a prefetcher with the default proximity threshold.
    pub fn new(client: QueryClient, notifier: Arc<dyn ProximityNotifier>) -> Self {
        Self::with_threshold(client, notifier, Self::DEFAULT_THRESHOLD_PX)
    }

    /// Create a prefetcher with a custom proximity threshold.
    pub fn with_threshold(
        client: QueryClient,
        notifier: Arc<dyn ProximityNotifier>,
        threshold_px: u32,
    ) -> Self {
        Self {
            client,
            notifier,
            threshold_px,
            fired: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Observe a section element and bind it to the list key of the
    /// category that follows it.
    pub fn observe(
        &self,
        element: ElementId,
        next_key: QueryKey,
        query: impl Into<String>,
        args: Value,
    ) -> ObservationGuard {
        let client = self.client.clone();
        let query = query.into();
        let fired = self.fired.clone();
        let notifier = Arc::downgrade(&self.notifier);
        let id = element.clone();
        self.notifier.register(
            element.clone(),
            self.threshold_px,
            Box::new(move || {
                let newly_fired = fired
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id.clone());
                if !newly_fired {
                    return;
                }
                trace!(element = %id, key = %next_key, "section prefetch fired");
                let client = client.clone();
                let key = next_key.clone();
                let query = query.clone();
                let args = args.clone();
                let notifier = notifier.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    client.prefetch(&key, &query, args).await;
                    // Fired sections need no further observation. Deferred
                    // so a notifier that calls back under its own lock is
                    // safe to unregister from.
                    if let Some(notifier) = notifier.upgrade() {
                        notifier.unregister(&id);
                    }
                });
            }),
        );
        ObservationGuard {
            notifier: self.notifier.clone(),
            element,
        }
    }
}
