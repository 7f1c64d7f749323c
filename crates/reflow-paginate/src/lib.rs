//! Page accumulation for unbounded and jump-to-page lists.
//!
//! Two pagination styles, identical from the caller's perspective:
//! [`InfiniteQuery`] merges cursor-based pages into one flat sequence
//! with a retained-page cap, and [`PagedQuery`] navigates offset-based
//! pages directly, prefetching the neighbours of the page on display.

mod args;
mod cursor;
mod offset;

pub use cursor::{InfiniteQuery, PageResponse};
pub use offset::{OffsetResponse, PagedQuery};
