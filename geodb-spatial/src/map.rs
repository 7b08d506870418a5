//! Backing spatial map contract.
//!
//! The index delegates storage to a persistent, multi-dimensional ordered map
//! (an R-tree in the database store). Only the contract lives here; node
//! splitting and balancing belong to the implementation.
//!
//! # Concurrency
//!
//! Maps use interior mutability and are shared as `&self`. Implementations
//! provide their own consistency (copy-on-write pages, versioned roots, or a
//! lock); iterators are snapshots and never observe later writes.

use crate::error::Result;
use crate::key::SpatialKey;

/// Iterator over keys returned by map scans.
pub type KeyIter = Box<dyn Iterator<Item = SpatialKey> + Send>;

/// Multi-dimensional ordered map of spatial keys.
///
/// Duplicate keys are permitted; each `add` stores one entry and each
/// successful `remove` deletes one.
pub trait SpatialMap: Send + Sync {
    /// Map name, unique within its store.
    fn name(&self) -> &str;

    /// Add a key.
    fn add(&self, key: SpatialKey) -> Result<()>;

    /// Remove one entry equal to `key` (row id and box). Returns whether an
    /// entry was found.
    fn remove(&self, key: &SpatialKey) -> Result<bool>;

    /// All keys.
    fn iter_all(&self) -> Result<KeyIter>;

    /// Keys whose box intersects the query box. Keys without a box, and any
    /// query without a box, match nothing.
    fn iter_intersecting(&self, query: &SpatialKey) -> Result<KeyIter>;

    /// Remove every key.
    fn clear(&self) -> Result<()>;

    /// Number of entries.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the map can no longer be used (its store was closed or the map
    /// was removed).
    fn is_closed(&self) -> bool;
}

/// Store that owns spatial maps.
///
/// A persistent store namespaces maps by name; opening an existing name
/// returns its current content.
pub trait SpatialStore: Send + Sync {
    /// Open or create a map.
    fn open_map(&self, name: &str) -> Result<Box<dyn SpatialMap>>;

    /// Delete a map and its content from the store.
    fn remove_map(&self, map: &dyn SpatialMap) -> Result<()>;

    /// Release the store. Maps opened from it become closed.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
