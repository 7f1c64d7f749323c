//! Speculative background fetch scheduling.
//!
//! Two independent triggers populate the shared cache store ahead of
//! real reads: a debounced hover trigger for item details, and a
//! viewport-proximity trigger for the next category section. Both issue
//! zero-retry reads through the query client, so a prediction that turns
//! out wrong costs one cheap request at most and never consumes retry
//! budget. A prefetch landing on an already-fresh key is a no-op.

mod hover;
mod viewport;

pub use hover::HoverPrefetcher;
pub use viewport::{ElementId, ObservationGuard, ProximityNotifier, SectionPrefetcher};
