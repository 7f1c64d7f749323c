//! Named optimistic-write operations.
//!
//! Each function synchronously writes a predicted value into every cache
//! entry that can contain the affected record. A record may sit in
//! several concurrently cached lists (a browse list and a search page,
//! say); every patched value is computed before any write lands, so the
//! record is never half-updated across lists. Rollback is handled by the
//! mutation coordinator's snapshot, which these functions must be exact
//! inverses of under restore.
//!
//! Cached list values come in two shapes, both supported: a bare JSON
//! array, and an object with an `items` array (cursor pages).

use reflow_cache::CacheStore;
use reflow_core::QueryKey;
use serde_json::Value;
use tracing::trace;

use crate::keys;
use crate::record::{Review, Tool};

fn list_items_mut(value: &mut Value) -> Option<&mut Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get_mut("items").and_then(Value::as_array_mut),
        _ => None,
    }
}

fn is_record(value: &Value, id: &str) -> bool {
    value.get("id").and_then(Value::as_str) == Some(id)
}

/// Apply `patch` to every cached browse list and search page, writing
/// back only the values it actually changed, and only after all of them
/// have been computed.
fn patch_cached_lists(store: &CacheStore, patch: impl Fn(&mut Vec<Value>) -> bool) {
    let mut updates: Vec<(QueryKey, Value)> = Vec::new();
    for prefix in [keys::tools::lists(), keys::tools::searches()] {
        for key in store.keys_with_prefix(&prefix) {
            let Some(mut value) = store.get_raw(&key) else {
                continue;
            };
            let Some(items) = list_items_mut(&mut value) else {
                continue;
            };
            if patch(items) {
                updates.push((key, value));
            }
        }
    }
    for (key, value) in updates {
        store.set_raw(key, value);
    }
}

fn bump_favourite_count(record: &mut Value, delta: i64) -> bool {
    let Some(count) = record.get("favouriteCount").and_then(Value::as_i64) else {
        return false;
    };
    record["favouriteCount"] = Value::from((count + delta).max(0));
    true
}

/// Toggle `tool_id` in `user`'s cached favourite ids and shift the
/// tool's favourite count everywhere the record is cached.
///
/// When the ids list is not cached nothing is written; the settle-time
/// invalidation of the surrounding mutation repairs the view instead.
pub fn toggle_favourite(store: &CacheStore, user: &str, tool_id: &str) {
    let ids_key = keys::favourites::ids(user);
    let Some(mut value) = store.get_raw(&ids_key) else {
        return;
    };
    let Some(ids) = value.as_array_mut() else {
        return;
    };

    let added = match ids.iter().position(|id| id.as_str() == Some(tool_id)) {
        Some(index) => {
            ids.remove(index);
            false
        }
        None => {
            ids.push(Value::from(tool_id));
            true
        }
    };
    trace!(user, tool_id, added, "favourite toggled");
    store.set_raw(ids_key, value);

    let delta = if added { 1 } else { -1 };
    for key in store.keys_with_prefix(&keys::tools::details()) {
        let Some(mut record) = store.get_raw(&key) else {
            continue;
        };
        if is_record(&record, tool_id) && bump_favourite_count(&mut record, delta) {
            store.set_raw(key, record);
        }
    }
    patch_cached_lists(store, |items| {
        let mut changed = false;
        for item in items.iter_mut() {
            if is_record(item, tool_id) {
                changed |= bump_favourite_count(item, delta);
            }
        }
        changed
    });
}

/// Replace the record with `tool.id` in every cached list that holds
/// it, and in its detail entry when cached.
pub fn patch_tool_in_lists(store: &CacheStore, tool: &Tool) {
    let Ok(predicted) = serde_json::to_value(tool) else {
        return;
    };
    let detail = keys::tools::detail(&tool.slug);
    if store.get_raw(&detail).is_some() {
        store.set_raw(detail, predicted.clone());
    }
    patch_cached_lists(store, |items| {
        let mut changed = false;
        for item in items.iter_mut() {
            if is_record(item, &tool.id) {
                *item = predicted.clone();
                changed = true;
            }
        }
        changed
    });
}

/// Drop the record with `tool_id` from every cached list.
pub fn remove_tool_from_lists(store: &CacheStore, tool_id: &str) {
    patch_cached_lists(store, |items| {
        let before = items.len();
        items.retain(|item| !is_record(item, tool_id));
        items.len() != before
    });
}

/// Append a review to the tool's cached review list and fold its rating
/// into the detail record's aggregate.
pub fn append_review(store: &CacheStore, review: &Review) {
    let Ok(predicted) = serde_json::to_value(review) else {
        return;
    };
    let reviews_key = keys::reviews::for_tool(&review.tool_slug);
    if let Some(mut value) = store.get_raw(&reviews_key) {
        if let Some(items) = list_items_mut(&mut value) {
            items.push(predicted);
            store.set_raw(reviews_key, value);
        }
    }

    let detail_key = keys::tools::detail(&review.tool_slug);
    let Some(mut detail) = store.get_raw(&detail_key) else {
        return;
    };
    let count = detail.get("reviewCount").and_then(Value::as_u64);
    let average = detail.get("rating").and_then(Value::as_f64);
    if let (Some(count), Some(average)) = (count, average) {
        let total = average * count as f64 + review.rating;
        detail["reviewCount"] = Value::from(count + 1);
        detail["rating"] = Value::from(total / (count + 1) as f64);
        store.set_raw(detail_key, detail);
    }
}
