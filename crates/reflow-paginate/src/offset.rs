//! Offset-based page navigation with adjacent-page prefetching.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use reflow_core::{KeyFamily, Params, QueryKey};
use reflow_query::{QueryClient, QueryError};

use crate::args::args_object;

/// One page as returned by the backend for an offset query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetResponse<T> {
    /// Items of this page, in backend order.
    pub items: Vec<T>,
    /// Total matching records, for page-count derivation.
    pub total: u64,
}

/// Direct jump-to-page navigation over offset-paginated results.
///
/// Showing page `N` eagerly issues non-blocking background reads for
/// pages `N-1` and `N+1` when in range, so Next/Previous navigation is
/// typically served from cache.
pub struct PagedQuery<T> {
    client: QueryClient,
    family: KeyFamily,
    operation: String,
    query_name: String,
    filters: Params,
    page: u32,
    page_size: u32,
    total: Option<u64>,
    items: Vec<T>,
}

impl<T: DeserializeOwned> PagedQuery<T> {
    /// Create a navigator for `[family, operation, {filters, offset,
    /// limit}]` pages fetched through `query_name`.
    pub fn new(
        client: QueryClient,
        family: KeyFamily,
        operation: impl Into<String>,
        query_name: impl Into<String>,
        filters: Params,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            family,
            operation: operation.into(),
            query_name: query_name.into(),
            filters,
            page: 1,
            page_size: page_size.max(1),
            total: None,
            items: Vec::new(),
        }
    }

    /// The page currently shown (1-based).
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items of the current page.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Total page count, once a page has loaded.
    pub fn total_pages(&self) -> Option<u32> {
        self.total
            .map(|total| (total.div_ceil(self.page_size as u64)).max(1) as u32)
    }

    /// Navigate to a page, serving from cache when the entry is fresh.
    pub async fn go_to_page(&mut self, page: u32) -> Result<(), QueryError> {
        let page = page.max(1);
        let key = self.page_key(page);

        let response = match self.cached_fresh(&key) {
            Some(cached) => {
                trace!(key = %key, "page served from cache");
                cached
            }
            None => {
                let value = self
                    .client
                    .fetch(&key, &self.query_name, self.page_args(page))
                    .await?;
                serde_json::from_value(value).map_err(|err| QueryError::Decode(err.to_string()))?
            }
        };

        self.page = page;
        self.total = Some(response.total);
        self.items = response.items;
        self.prefetch_adjacent();
        Ok(())
    }

    /// Replace the filters and reload from page 1.
    pub async fn apply_filters(&mut self, filters: Params) -> Result<(), QueryError> {
        self.filters = filters;
        self.total = None;
        self.items.clear();
        self.go_to_page(1).await
    }

    fn cached_fresh(&self, key: &QueryKey) -> Option<OffsetResponse<T>> {
        let store = self.client.store();
        if !store.is_fresh(key, self.client.policies().resolve(key)) {
            return None;
        }
        store.get(key)
    }

    /// Background reads for the neighbours of the current page.
    fn prefetch_adjacent(&self) {
        let mut neighbours = Vec::new();
        if self.page > 1 {
            neighbours.push(self.page - 1);
        }
        if let Some(total_pages) = self.total_pages() {
            if self.page < total_pages {
                neighbours.push(self.page + 1);
            }
        }
        for neighbour in neighbours {
            let client = self.client.clone();
            let key = self.page_key(neighbour);
            let query_name = self.query_name.clone();
            let args = self.page_args(neighbour);
            tokio::spawn(async move {
                client.prefetch(&key, &query_name, args).await;
            });
        }
    }

    fn offset_of(&self, page: u32) -> u64 {
        (page as u64 - 1) * self.page_size as u64
    }

    fn page_key(&self, page: u32) -> QueryKey {
        let params = self
            .filters
            .clone()
            .set("offset", self.offset_of(page) as i64)
            .set("limit", self.page_size);
        self.family.leaf(&self.operation, params)
    }

    fn page_args(&self, page: u32) -> Value {
        let mut args = args_object(&self.filters);
        args.insert("offset".to_string(), Value::from(self.offset_of(page)));
        args.insert("limit".to_string(), Value::from(self.page_size));
        Value::Object(args)
    }
}
