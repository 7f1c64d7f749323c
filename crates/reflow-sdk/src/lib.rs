//! # Reflow SDK
//!
//! Client-side synchronization layer between a UI and a hosted reactive
//! backend: a keyed cache with per-class freshness policies, optimistic
//! mutations with exact rollback, cursor and offset pagination mergers,
//! and hover / viewport prefetch triggers, all over one shared store.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reflow_sdk::prelude::*;
//!
//! let layer = SyncLayer::new(backend, directory_policy_table(), SyncConfig::default());
//!
//! // Cache-first read of one tool's detail record.
//! let tool: ReadResult<Tool> = layer
//!     .read(&keys::tools::detail("claude"), "getTool", json!({"slug": "claude"}))
//!     .await;
//!
//! // Optimistic favourite toggle with automatic rollback on failure.
//! let plan = MutationPlan::new("toggleFavourite")
//!     .args(json!({"toolId": "X"}))
//!     .affects(keys::favourites::ids("alice"))
//!     .on_optimistic(|store, _| optimistic::toggle_favourite(store, "alice", "X"));
//! layer.mutate(plan).await?;
//! ```
//!
//! ## Architecture
//!
//! The SDK re-exports the underlying crates:
//! - `reflow-core` for query keys
//! - `reflow-cache` for the store and freshness policies
//! - `reflow-query` for reads, retries, and the mutation protocol
//! - `reflow-paginate` for the two pagination styles
//! - `reflow-prefetch` for hover and viewport triggers
//! - `reflow-catalog` for the directory's keys, policy table, and named
//!   cache operations

pub mod prelude;

mod config;
mod layer;

pub use config::SyncConfig;
pub use layer::SyncLayer;

// Re-export core crates
pub use reflow_cache as cache;
pub use reflow_catalog as catalog;
pub use reflow_core as core;
pub use reflow_paginate as paginate;
pub use reflow_prefetch as prefetch;
pub use reflow_query as query;
