//! In-memory cache store and freshness policies.
//!
//! The [`CacheStore`] is the single shared mutable resource of the
//! synchronization layer: one instance per browser tab, created at
//! startup, cleared only on sign-out. Every other component reaches it
//! through its narrow get/set/invalidate/cancel interface. The store
//! tolerates being overwritten at any time (live push updates from the
//! backend are authoritative).

mod entry;
mod error;
mod policy;
mod store;

pub use entry::{CacheEntry, EntryStatus};
pub use error::CacheError;
pub use policy::{BackoffStrategy, DataClass, FreshnessPolicy, PolicyTable};
pub use store::CacheStore;
