//! Core types for the reflow cache synchronization layer.
//!
//! The only concern of this crate is the hierarchical *key space*: every
//! cached query result is addressed by a [`QueryKey`], and invalidation
//! works on key prefixes. Higher layers (store, client, pagination,
//! prefetch) all speak in these keys.

mod key;

pub use key::{family, KeyFamily, ParamValue, Params, QueryKey, Segment};
