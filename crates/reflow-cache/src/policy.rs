//! Per-data-class freshness policies.

use std::collections::HashMap;
use std::time::Duration;

use reflow_core::QueryKey;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and cap.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u64.saturating_pow(attempt);
                let delay =
                    Duration::from_millis((base.as_millis() as u64).saturating_mul(multiplier));
                std::cmp::min(delay, *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_millis(500),
        }
    }
}

/// The data class a key belongs to, driving its freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    /// Long-lived reference data (categories, stats).
    Static,
    /// Short-lived per-user data (favourites).
    UserScoped,
    /// Search results, eagerly revalidated.
    Search,
    /// Polled data with a periodic refetch interval.
    RealTime,
    /// Everything else (tool data).
    Default,
}

/// Named freshness configuration for one data class.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessPolicy {
    /// How long an entry stays fresh after a successful fetch.
    pub stale_after: Duration,
    /// How long an unobserved entry survives before eviction.
    pub evict_after: Duration,
    /// Whether a mount-time read revalidates even a fresh entry.
    pub refetch_on_mount: bool,
    /// Whether a reconnect revalidates the entry.
    pub refetch_on_reconnect: bool,
    /// Read retries after the first attempt.
    pub max_retries: u32,
    /// Delay schedule between retries.
    pub retry_backoff: BackoffStrategy,
    /// Periodic refetch interval; only set for real-time classes.
    pub refetch_interval: Option<Duration>,
}

impl FreshnessPolicy {
    /// Create a policy with the given stale and evict windows.
    ///
    /// The evict window is clamped to at least the stale window: an entry
    /// must pass through the stale-but-cached state before it becomes
    /// eligible for garbage collection.
    pub fn new(stale_after: Duration, evict_after: Duration) -> Self {
        Self {
            stale_after,
            evict_after: evict_after.max(stale_after),
            refetch_on_mount: false,
            refetch_on_reconnect: false,
            max_retries: 2,
            retry_backoff: BackoffStrategy::default(),
            refetch_interval: None,
        }
    }

    /// Revalidate on mount even when the entry is fresh.
    pub fn with_refetch_on_mount(mut self) -> Self {
        self.refetch_on_mount = true;
        self
    }

    /// Revalidate when connectivity returns.
    pub fn with_refetch_on_reconnect(mut self) -> Self {
        self.refetch_on_reconnect = true;
        self
    }

    /// Set the read retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the retry backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Enable periodic refetching at the given interval.
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60), Duration::from_secs(30 * 60))
    }
}

impl DataClass {
    /// The built-in policy for this class.
    fn builtin_policy(self) -> FreshnessPolicy {
        match self {
            Self::Static => {
                FreshnessPolicy::new(Duration::from_secs(60 * 60), Duration::from_secs(24 * 3600))
            }
            Self::UserScoped => {
                FreshnessPolicy::new(Duration::from_secs(30), Duration::from_secs(5 * 60))
                    .with_refetch_on_mount()
                    .with_refetch_on_reconnect()
            }
            Self::Search => {
                FreshnessPolicy::new(Duration::from_secs(2 * 60), Duration::from_secs(15 * 60))
                    .with_refetch_on_mount()
                    .with_max_retries(1)
            }
            Self::RealTime => {
                FreshnessPolicy::new(Duration::from_secs(10), Duration::from_secs(5 * 60))
                    .with_refetch_interval(Duration::from_secs(15))
            }
            Self::Default => FreshnessPolicy::default(),
        }
    }
}

/// Lookup table mapping key families and operations to data classes.
///
/// Resolution is a pure function of the key: `(family, operation)` first,
/// then `(family)`, then the default class. No hidden state.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    by_category: HashMap<(String, String), DataClass>,
    by_family: HashMap<String, DataClass>,
    policies: HashMap<DataClass, FreshnessPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyTable {
    /// Create a table with the built-in per-class policies and no mappings.
    pub fn new() -> Self {
        let mut policies = HashMap::new();
        for class in [
            DataClass::Static,
            DataClass::UserScoped,
            DataClass::Search,
            DataClass::RealTime,
            DataClass::Default,
        ] {
            policies.insert(class, class.builtin_policy());
        }
        Self {
            by_category: HashMap::new(),
            by_family: HashMap::new(),
            policies,
        }
    }

    /// Override the policy for a data class.
    pub fn with_class_policy(mut self, class: DataClass, policy: FreshnessPolicy) -> Self {
        self.policies.insert(class, policy);
        self
    }

    /// Map a `(family, operation)` category to a data class.
    pub fn map_category(mut self, family: &str, operation: &str, class: DataClass) -> Self {
        self.by_category
            .insert((family.to_string(), operation.to_string()), class);
        self
    }

    /// Map an entire family to a data class.
    pub fn map_family(mut self, family: &str, class: DataClass) -> Self {
        self.by_family.insert(family.to_string(), class);
        self
    }

    /// The data class a key resolves to.
    pub fn class_for(&self, key: &QueryKey) -> DataClass {
        if let (Some(family), Some(op)) = (key.family(), key.operation()) {
            if let Some(class) = self.by_category.get(&(family.to_string(), op.to_string())) {
                return *class;
            }
        }
        if let Some(family) = key.family() {
            if let Some(class) = self.by_family.get(family) {
                return *class;
            }
        }
        DataClass::Default
    }

    /// The policy configured for a data class.
    pub fn policy(&self, class: DataClass) -> &FreshnessPolicy {
        // Every class is seeded in `new`, and `with_class_policy` only
        // replaces entries, so the lookup cannot miss.
        self.policies
            .get(&class)
            .unwrap_or_else(|| &self.policies[&DataClass::Default])
    }

    /// Resolve the policy that applies to a key.
    pub fn resolve(&self, key: &QueryKey) -> &FreshnessPolicy {
        self.policy(self.class_for(key))
    }
}
