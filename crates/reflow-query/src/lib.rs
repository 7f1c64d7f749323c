//! Query client and mutation coordinator.
//!
//! This crate owns the traffic between the cache store and the remote
//! reactive backend: plain reads with retry and in-flight de-duplication,
//! zero-retry background prefetches, and the optimistic-mutation protocol
//! with guaranteed rollback.

mod backend;
mod client;
mod error;
mod mutation;
mod retry;

pub mod testing;

pub use backend::RemoteBackend;
pub use client::{QueryClient, ReadResult};
pub use error::QueryError;
pub use mutation::{MutationCoordinator, MutationPlan, MutationState, RollbackContext};
pub use retry::RetryPolicy;
