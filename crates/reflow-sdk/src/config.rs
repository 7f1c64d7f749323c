//! Tunables for one sync layer instance.

use std::time::Duration;

/// Knobs the host application can adjust without touching the policy
/// table. Defaults match the behaviour described throughout the lower
/// crates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Debounce window before a hover fires a prefetch.
    pub hover_delay: Duration,
    /// Distance from the viewport edge at which section prefetches fire.
    pub proximity_threshold_px: u32,
    /// Page cap for cursor-based infinite lists.
    pub max_retained_pages: usize,
    /// Page size for offset-based navigation.
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hover_delay: Duration::from_millis(200),
            proximity_threshold_px: 300,
            max_retained_pages: 10,
            page_size: 20,
        }
    }
}

impl SyncConfig {
    pub fn with_hover_delay(mut self, delay: Duration) -> Self {
        self.hover_delay = delay;
        self
    }

    pub fn with_proximity_threshold_px(mut self, threshold: u32) -> Self {
        self.proximity_threshold_px = threshold;
        self
    }

    pub fn with_max_retained_pages(mut self, pages: usize) -> Self {
        self.max_retained_pages = pages.max(1);
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }
}
