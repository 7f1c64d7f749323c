//! Debounced hover prefetching.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use reflow_core::QueryKey;
use reflow_query::QueryClient;

/// Issues one background read for an item's detail key after the pointer
/// has rested on it for the debounce window.
///
/// At most one hover intent is pending at a time: a new `pointer_enter`
/// cancels the previous timer, and `pointer_leave` cancels outright. The
/// fired read goes through [`QueryClient::prefetch`], so it carries zero
/// retries and is skipped entirely when the key is already fresh.
pub struct HoverPrefetcher {
    client: QueryClient,
    delay: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl HoverPrefetcher {
    /// Default debounce window.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    /// Create a prefetcher with the default debounce window.
    pub fn new(client: QueryClient) -> Self {
        Self::with_delay(client, Self::DEFAULT_DELAY)
    }

    /// Create a prefetcher with a custom debounce window.
    pub fn with_delay(client: QueryClient, delay: Duration) -> Self {
        Self {
            client,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Pointer entered an item: arm the debounce timer for its key,
    /// cancelling any previously pending hover intent.
    pub fn pointer_enter(&self, key: QueryKey, query: impl Into<String>, args: Value) {
        let client = self.client.clone();
        let query = query.into();
        // The window starts at the pointer event, not when the spawned
        // task is first polled.
        let deadline = Instant::now() + self.delay;
        trace!(key = %key, "hover intent armed");
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            client.prefetch(&key, &query, args).await;
        });
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Pointer left: cancel the pending hover intent, if any.
    pub fn pointer_leave(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pending) = pending {
            trace!("hover intent cancelled");
            pending.abort();
        }
    }
}

impl Drop for HoverPrefetcher {
    fn drop(&mut self) {
        self.pointer_leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_cache::{CacheStore, PolicyTable};
    use reflow_query::testing::MockBackend;
    use reflow_core::family;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::task::yield_now;
    use tokio::time::advance;

    const TOOLS: reflow_core::KeyFamily = family("tools");

    fn hover(backend: &Arc<MockBackend>, delay_ms: u64) -> HoverPrefetcher {
        let client = QueryClient::new(
            CacheStore::new(),
            Arc::new(PolicyTable::new()),
            backend.clone(),
        );
        HoverPrefetcher::with_delay(client, Duration::from_millis(delay_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_held_past_threshold_fires_once() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("getTool", json!({"slug": "a"}));
        let hover = hover(&backend, 200);

        hover.pointer_enter(TOOLS.leaf_id("detail", "a"), "getTool", json!({"slug": "a"}));
        advance(Duration::from_millis(250)).await;
        yield_now().await;

        assert_eq!(backend.query_calls("getTool"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_before_threshold_cancels() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("getTool", json!({}));
        let hover = hover(&backend, 200);

        hover.pointer_enter(TOOLS.leaf_id("detail", "a"), "getTool", json!({"slug": "a"}));
        advance(Duration::from_millis(100)).await;
        hover.pointer_leave();
        advance(Duration::from_millis(500)).await;
        yield_now().await;

        assert_eq!(backend.query_calls("getTool"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenter_debounces_to_second_target_only() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("getTool", json!({}));
        let hover = hover(&backend, 200);

        // Enter a, leave within 100ms, enter b and hold for 250ms:
        // exactly one prefetch fires, for b.
        hover.pointer_enter(TOOLS.leaf_id("detail", "a"), "getTool", json!({"slug": "a"}));
        advance(Duration::from_millis(100)).await;
        hover.pointer_leave();
        hover.pointer_enter(TOOLS.leaf_id("detail", "b"), "getTool", json!({"slug": "b"}));
        advance(Duration::from_millis(250)).await;
        yield_now().await;

        assert_eq!(backend.query_calls("getTool"), 1);
        assert_eq!(backend.last_args("getTool").unwrap(), json!({"slug": "b"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_reenter_keeps_single_pending_intent() {
        let backend = Arc::new(MockBackend::new());
        backend.respond("getTool", json!({}));
        let hover = hover(&backend, 200);

        for slug in ["a", "b", "c"] {
            hover.pointer_enter(
                TOOLS.leaf_id("detail", slug),
                "getTool",
                json!({"slug": slug}),
            );
            advance(Duration::from_millis(50)).await;
        }
        advance(Duration::from_millis(250)).await;
        yield_now().await;

        assert_eq!(backend.query_calls("getTool"), 1);
        assert_eq!(backend.last_args("getTool").unwrap(), json!({"slug": "c"}));
    }
}
