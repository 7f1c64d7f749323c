//! Directory-domain wiring for the sync layer.
//!
//! Everything generic lives in the lower crates; this one pins the
//! concrete entity families of the tools directory (tools, categories,
//! favourites, reviews, stats) to query keys, freshness classes, and the
//! named invalidation / optimistic-write operations the mutation plans
//! compose from.

pub mod invalidate;
pub mod keys;
pub mod optimistic;

mod policy;
mod record;

pub use policy::directory_policy_table;
pub use record::{Category, Review, Tool};
