//! Cursor-based infinite list merging.

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use reflow_core::{KeyFamily, Params, QueryKey};
use reflow_query::{QueryClient, QueryError};

use crate::args::args_object;

/// One page as returned by the backend for a cursor query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    /// Items of this page, in backend order.
    pub items: Vec<T>,
    /// Continuation token for the following page.
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Whether the backend has no further pages.
    #[serde(default)]
    pub is_done: bool,
}

/// Merges cursor-paginated pages into one flat, ordered sequence.
///
/// Pages accumulate in fetch order. Retention is capped: once more than
/// `max_pages` pages are held, the oldest is dropped, which bounds memory
/// for unbounded scrolling. The continuation cursor always comes from the
/// most recently fetched page and survives the drop, so later fetches are
/// unaffected by truncation.
pub struct InfiniteQuery<T> {
    client: QueryClient,
    family: KeyFamily,
    operation: String,
    query_name: String,
    filters: Params,
    pages: VecDeque<Vec<T>>,
    /// Cursor for the next fetch, from the most recent page.
    cursor: Option<String>,
    is_done: bool,
    /// Whether any page has been fetched yet.
    started: bool,
    is_fetching_next: bool,
    max_pages: usize,
}

impl<T: DeserializeOwned> InfiniteQuery<T> {
    /// Default retained page cap.
    pub const DEFAULT_MAX_PAGES: usize = 10;

    /// Create a merger for `[family, operation, {filters, cursor}]` pages
    /// fetched through `query_name`.
    pub fn new(
        client: QueryClient,
        family: KeyFamily,
        operation: impl Into<String>,
        query_name: impl Into<String>,
        filters: Params,
    ) -> Self {
        Self {
            client,
            family,
            operation: operation.into(),
            query_name: query_name.into(),
            filters,
            pages: VecDeque::new(),
            cursor: None,
            is_done: false,
            started: false,
            is_fetching_next: false,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }

    /// Override the retained page cap.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Whether the backend reports further pages.
    pub fn has_next_page(&self) -> bool {
        !self.is_done
    }

    /// Whether a next-page fetch is in flight.
    pub fn is_fetching_next_page(&self) -> bool {
        self.is_fetching_next
    }

    /// The flattened item sequence across retained pages, oldest first.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    /// Number of pages currently retained.
    pub fn retained_pages(&self) -> usize {
        self.pages.len()
    }

    /// Fetch and append the next page.
    ///
    /// Returns `Ok(false)` without touching the backend when the list is
    /// exhausted or a next-page fetch is already in flight.
    pub async fn fetch_next_page(&mut self) -> Result<bool, QueryError> {
        if (self.started && self.is_done) || self.is_fetching_next {
            return Ok(false);
        }
        self.is_fetching_next = true;
        let key = self.page_key();
        let args = self.page_args();
        trace!(key = %key, "fetching next page");
        let outcome = self.client.fetch(&key, &self.query_name, args).await;
        self.is_fetching_next = false;

        let page: PageResponse<T> = serde_json::from_value(outcome?)
            .map_err(|err| QueryError::Decode(err.to_string()))?;
        self.cursor = page.next_cursor;
        self.is_done = page.is_done;
        self.started = true;
        self.pages.push_back(page.items);
        while self.pages.len() > self.max_pages {
            self.pages.pop_front();
            debug!(max_pages = self.max_pages, "dropped oldest retained page");
        }
        Ok(true)
    }

    fn page_key(&self) -> QueryKey {
        let params = self
            .filters
            .clone()
            .set_opt("cursor", self.cursor.clone());
        self.family.leaf(&self.operation, params)
    }

    fn page_args(&self) -> Value {
        let mut args = args_object(&self.filters);
        if let Some(cursor) = &self.cursor {
            args.insert("cursor".to_string(), Value::String(cursor.clone()));
        }
        Value::Object(args)
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

    const TOOLS: reflow_core::KeyFamily = family("tools");

    fn infinite(backend: &Arc<MockBackend>) -> InfiniteQuery<i64> {
        let client = QueryClient::new(
            CacheStore::new(),
            Arc::new(PolicyTable::new()),
            backend.clone(),
        );
        InfiniteQuery::new(client, TOOLS, "list", "listTools", Params::new())
    }

    fn page(items: &[i64], next: Option<&str>, done: bool) -> Value {
        json!({"items": items, "nextCursor": next, "isDone": done})
    }

    #[tokio::test(start_paused = true)]
    async fn test_flattened_items_concatenate_pages_in_order() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("listTools", Ok(page(&[1, 2], Some("c1"), false)));
        backend.enqueue("listTools", Ok(page(&[3, 4], Some("c2"), false)));
        backend.enqueue("listTools", Ok(page(&[5], None, true)));
        let mut list = infinite(&backend);

        while list.has_next_page() {
            list.fetch_next_page().await.unwrap();
        }

        let items: Vec<i64> = list.items().copied().collect();
        assert_eq!(items, [1, 2, 3, 4, 5]);
        assert!(!list.has_next_page());
    }

    #[tokio::test(start_paused = true)]
    async fn test_has_next_page_tracks_backend_is_done() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("listTools", Ok(page(&[1], Some("c1"), false)));
        backend.enqueue("listTools", Ok(page(&[2], None, true)));
        let mut list = infinite(&backend);

        assert!(list.has_next_page());
        list.fetch_next_page().await.unwrap();
        assert!(list.has_next_page());
        list.fetch_next_page().await.unwrap();
        assert!(!list.has_next_page());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_after_done_skips_backend() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("listTools", Ok(page(&[1], None, true)));
        let mut list = infinite(&backend);

        list.fetch_next_page().await.unwrap();
        assert!(!list.fetch_next_page().await.unwrap());
        assert_eq!(backend.query_calls("listTools"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_cap_keeps_most_recent_pages_and_cursor() {
        let backend = Arc::new(MockBackend::new());
        for i in 0..15 {
            let next = format!("c{}", i + 1);
            backend.enqueue("listTools", Ok(page(&[i], Some(&next), i == 14)));
        }
        let mut list = infinite(&backend);

        for _ in 0..15 {
            list.fetch_next_page().await.unwrap();
        }

        assert_eq!(list.retained_pages(), 10);
        // Pages 0..5 were dropped; the 10 most recent remain in order.
        let items: Vec<i64> = list.items().copied().collect();
        assert_eq!(items, (5..15).collect::<Vec<_>>());
        // The continuation cursor still matches the latest page, so the
        // last fetch carried the true cursor despite truncation.
        assert_eq!(
            backend.last_args("listTools").unwrap()["cursor"],
            json!("c14")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_page_omits_cursor() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("listTools", Ok(page(&[1], None, true)));
        let mut list = infinite(&backend);

        list.fetch_next_page().await.unwrap();
        assert_eq!(backend.last_args("listTools").unwrap(), json!({}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_page_surfaces_decode_error() {
        let backend = Arc::new(MockBackend::new());
        backend.enqueue("listTools", Ok(json!({"rows": []})));
        let mut list = infinite(&backend);

        let err = list.fetch_next_page().await.unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
        assert!(!list.is_fetching_next_page());
    }
}
