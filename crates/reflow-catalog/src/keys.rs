//! Query keys for every entity family in the directory.
//!
//! Every cache key in the application is built here, so invalidation
//! prefixes and read keys can never drift apart.

/// Keys under the `tools` family.
pub mod tools {
    use reflow_core::{family, KeyFamily, Params, QueryKey};

    pub const FAMILY: KeyFamily = family("tools");

    /// Everything tool-related.
    pub fn all() -> QueryKey {
        FAMILY.all()
    }

    /// All cached browse lists, regardless of filters.
    pub fn lists() -> QueryKey {
        FAMILY.category("list")
    }

    /// One browse list for a concrete filter set.
    pub fn list(filters: Params) -> QueryKey {
        FAMILY.leaf("list", filters)
    }

    /// All cached detail records.
    pub fn details() -> QueryKey {
        FAMILY.category("detail")
    }

    /// The detail record for one tool.
    pub fn detail(slug: &str) -> QueryKey {
        FAMILY.leaf_id("detail", slug)
    }

    /// All cached search result pages.
    pub fn searches() -> QueryKey {
        FAMILY.category("search")
    }

    /// One search result page for concrete search params.
    pub fn search(params: Params) -> QueryKey {
        FAMILY.leaf("search", params)
    }
}

/// Keys under the `favourites` family.
pub mod favourites {
    use reflow_core::{family, KeyFamily, QueryKey};

    pub const FAMILY: KeyFamily = family("favourites");

    pub fn all() -> QueryKey {
        FAMILY.all()
    }

    /// The favourite tool-id list of one user.
    pub fn ids(user: &str) -> QueryKey {
        FAMILY.leaf_id("ids", user)
    }
}

/// Keys under the `categories` family.
pub mod categories {
    use reflow_core::{family, KeyFamily, Params, QueryKey};

    pub const FAMILY: KeyFamily = family("categories");

    pub fn all() -> QueryKey {
        FAMILY.all()
    }

    /// The full category list.
    pub fn list() -> QueryKey {
        FAMILY.leaf("list", Params::new())
    }
}

/// Keys under the `reviews` family.
pub mod reviews {
    use reflow_core::{family, KeyFamily, QueryKey};

    pub const FAMILY: KeyFamily = family("reviews");

    pub fn all() -> QueryKey {
        FAMILY.all()
    }

    /// Reviews attached to one tool.
    pub fn for_tool(slug: &str) -> QueryKey {
        FAMILY.leaf_id("list", slug)
    }
}

/// Keys under the `stats` family.
pub mod stats {
    use reflow_core::{family, KeyFamily, Params, QueryKey};

    pub const FAMILY: KeyFamily = family("stats");

    pub fn all() -> QueryKey {
        FAMILY.all()
    }

    /// Aggregate directory counts shown on the landing page.
    pub fn overview() -> QueryKey {
        FAMILY.leaf("overview", Params::new())
    }

    /// The live-activity ticker, polled on an interval.
    pub fn live() -> QueryKey {
        FAMILY.leaf("live", Params::new())
    }
}
