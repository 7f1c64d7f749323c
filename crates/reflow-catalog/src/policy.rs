//! Freshness class wiring for the directory's key families.

use reflow_cache::{DataClass, PolicyTable};

/// The policy table for the directory.
///
/// Categories and aggregate stats are long-lived reference data, the
/// live-activity ticker polls on an interval, favourites are per-user
/// and revalidated eagerly, searches sit in between, and tool lists and
/// details fall through to the default class.
pub fn directory_policy_table() -> PolicyTable {
    PolicyTable::new()
        .map_family("categories", DataClass::Static)
        .map_family("stats", DataClass::Static)
        .map_category("stats", "live", DataClass::RealTime)
        .map_family("favourites", DataClass::UserScoped)
        .map_category("tools", "search", DataClass::Search)
}
