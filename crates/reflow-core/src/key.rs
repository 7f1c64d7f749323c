//! Hierarchical query key composition.
//!
//! A key is an ordered sequence of segments: `[entity, operation, params]`.
//! Keys are value objects: compared structurally, never mutated after
//! construction. A key `A` is a *prefix* of key `B` when `A`'s segments are
//! a leading subsequence of `B`'s; invalidating a prefix affects exactly
//! the keys that extend it.

use std::collections::BTreeMap;
use std::fmt;

/// A scalar value usable as a key parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An order-independent record of named parameters.
///
/// Backed by a `BTreeMap`, so two `Params` built by setting the same
/// entries in any order compare (and hash) equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Create an empty parameter record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, returning the updated record.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Set a parameter only when a value is present.
    ///
    /// Absent filters are omitted from the key entirely, so
    /// `{category: None}` and `{}` address the same cache entry.
    pub fn set_opt(self, name: impl Into<String>, value: Option<impl Into<ParamValue>>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    /// Get a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Whether the record has no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named segment: entity family or operation.
    Text(String),
    /// A single scalar identifier (e.g. a tool slug).
    Scalar(ParamValue),
    /// A record of named parameters (e.g. list filters).
    Params(Params),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Scalar(v) => write!(f, "{}", v),
            Self::Params(p) => write!(f, "{}", p),
        }
    }
}

/// A hierarchical identifier for a cached result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    segments: Vec<Segment>,
}

impl QueryKey {
    /// Build a key from raw segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The key's segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The entity family (first segment), if textual.
    pub fn family(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// The operation (second segment), if textual.
    pub fn operation(&self) -> Option<&str> {
        match self.segments.get(1) {
            Some(Segment::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether this key is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// The `[entity, operation]` prefix of this key.
    ///
    /// For keys with fewer than two segments this is the key itself.
    /// Every leaf built through a [`KeyFamily`] shares its category's
    /// first two segments, so invalidating the category prefix reaches
    /// every leaf beneath it.
    pub fn category_prefix(&self) -> QueryKey {
        let end = self.segments.len().min(2);
        Self {
            segments: self.segments[..end].to_vec(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// Key builder for one entity family.
///
/// Each family exposes an `all` key (`[entity]`), category keys
/// (`[entity, operation]`), and leaf keys (`[entity, operation, params]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFamily {
    entity: &'static str,
}

/// Create the key builder for an entity family.
pub const fn family(entity: &'static str) -> KeyFamily {
    KeyFamily { entity }
}

impl KeyFamily {
    /// The family name.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// The `[entity]` key covering everything in this family.
    pub fn all(&self) -> QueryKey {
        QueryKey::from_segments(vec![Segment::Text(self.entity.to_string())])
    }

    /// A `[entity, operation]` category key.
    pub fn category(&self, operation: &str) -> QueryKey {
        QueryKey::from_segments(vec![
            Segment::Text(self.entity.to_string()),
            Segment::Text(operation.to_string()),
        ])
    }

    /// A `[entity, operation, params]` leaf key.
    pub fn leaf(&self, operation: &str, params: Params) -> QueryKey {
        QueryKey::from_segments(vec![
            Segment::Text(self.entity.to_string()),
            Segment::Text(operation.to_string()),
            Segment::Params(params),
        ])
    }

    /// A `[entity, operation, id]` leaf key with a scalar identifier.
    pub fn leaf_id(&self, operation: &str, id: impl Into<ParamValue>) -> QueryKey {
        QueryKey::from_segments(vec![
            Segment::Text(self.entity.to_string()),
            Segment::Text(operation.to_string()),
            Segment::Scalar(id.into()),
        ])
    }
}
