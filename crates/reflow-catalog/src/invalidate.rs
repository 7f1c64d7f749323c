//! Named invalidation operations.
//!
//! Each function marks a prefix of the cache stale so the next read
//! refetches from the source of truth. All of them are idempotent:
//! invalidating an already-stale or absent key is a no-op, never an
//! error.

use reflow_cache::CacheStore;
use tracing::debug;

use crate::keys;

/// Everything tool-related: lists, details, and searches.
pub fn all_tools(store: &CacheStore) {
    let count = store.invalidate_prefix(&keys::tools::all());
    debug!(count, "invalidated tools");
}

/// Every cached browse list, whatever its filters.
pub fn tool_lists(store: &CacheStore) {
    let count = store.invalidate_prefix(&keys::tools::lists());
    debug!(count, "invalidated tool lists");
}

/// One tool's detail record.
pub fn tool_detail(store: &CacheStore, slug: &str) {
    store.invalidate_prefix(&keys::tools::detail(slug));
}

/// Every cached search page. Fired after any write that can change
/// which records a search matches.
pub fn searches(store: &CacheStore) {
    let count = store.invalidate_prefix(&keys::tools::searches());
    debug!(count, "invalidated searches");
}

/// One user's favourite ids.
pub fn favourites(store: &CacheStore, user: &str) {
    store.invalidate_prefix(&keys::favourites::ids(user));
}

/// The category list.
pub fn categories(store: &CacheStore) {
    store.invalidate_prefix(&keys::categories::all());
}

/// Reviews attached to one tool.
pub fn reviews_for_tool(store: &CacheStore, slug: &str) {
    store.invalidate_prefix(&keys::reviews::for_tool(slug));
}

/// Aggregate stats, including the live ticker.
pub fn stats(store: &CacheStore) {
    store.invalidate_prefix(&keys::stats::all());
}
