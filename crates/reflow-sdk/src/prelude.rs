//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use reflow_sdk::prelude::*;
//! ```

// Keys
pub use reflow_core::{family, KeyFamily, ParamValue, Params, QueryKey};

// Store and policies
pub use reflow_cache::{
    BackoffStrategy, CacheStore, DataClass, EntryStatus, FreshnessPolicy, PolicyTable,
};

// Reads and mutations
pub use reflow_query::{
    MutationCoordinator, MutationPlan, MutationState, QueryClient, QueryError, ReadResult,
    RemoteBackend, RetryPolicy, RollbackContext,
};

// Pagination
pub use reflow_paginate::{InfiniteQuery, OffsetResponse, PagedQuery, PageResponse};

// Prefetch triggers
pub use reflow_prefetch::{
    ElementId, HoverPrefetcher, ObservationGuard, ProximityNotifier, SectionPrefetcher,
};

// Directory domain wiring
pub use reflow_catalog::{directory_policy_table, invalidate, keys, optimistic};
pub use reflow_catalog::{Category, Review, Tool};

// Facade
pub use crate::{SyncConfig, SyncLayer};
