//! Shared type definitions for the jshoist crate
//!
//! Hash collections keyed by module ids and identifier names are used by
//! every pass; these aliases keep iteration order deterministic where output
//! depends on it.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Type alias for IndexMap with FxHasher for better performance
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Type alias for IndexSet with FxHasher for better performance
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;
