//! Record shapes as the backend serializes them.

use serde::{Deserialize, Serialize};

/// A directory entry for one AI tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub favourite_count: u64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u64,
}

/// A user review attached to a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub tool_slug: String,
    pub author: String,
    pub rating: f64,
    #[serde(default)]
    pub body: Option<String>,
}

/// A browse category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub tool_count: u64,
}
