//! Spatial tree index for geometry columns.
//!
//! This crate indexes one geometry column of a relational table by bounding
//! box. It provides:
//!
//! - **EWKB walker** with pluggable targets (envelope, dimension system)
//! - **Envelope algebra** (intersection, union, canonical doubles) and the
//!   compact 21/41/93-byte envelope encoding
//! - **Index adapter** keeping one `(row id, box)` key per row in a backing
//!   multi-dimensional map
//! - **Result cursor** that turns matching keys into rows on demand
//!
//! # Architecture
//!
//! ```text
//!   row event ──► SpatialTreeIndex ──► spatial_key (ewkb::envelope_of, f32 narrowing)
//!                        │                          │
//!                        │                          ▼
//!                        │                 SpatialMap (trait) ◄── MemSpatialStore / R-tree store
//!                        ▼                          │
//!   query ──► find_by_geometry ──► iter_intersecting
//!                                                   │
//!                                                   ▼
//!                                   SpatialCursor ──► Table::get_row
//! ```
//!
//! # Modules
//!
//! - [`config`]: Index declaration and validation
//! - [`envelope`]: Envelope algebra and compact encoding
//! - [`ewkb`]: EWKB walker and targets
//! - [`value`]: Column values, geometry values and rows
//! - [`key`]: Spatial keys
//! - [`map`]: Backing map and store traits
//! - [`memory`]: In-memory store
//! - [`table`]: Session, table and cost model collaborators
//! - [`cursor`]: Result cursor
//! - [`index`]: The index adapter
//! - [`error`]: Error types

pub mod config;
pub mod cursor;
pub mod envelope;
pub mod error;
pub mod ewkb;
pub mod index;
pub mod key;
pub mod map;
pub mod memory;
pub mod table;
pub mod value;

// Re-export key types
pub use config::{Column, IndexColumn, SortType, SpatialIndexConfig, ValueType};
pub use cursor::SpatialCursor;
pub use envelope::{canonical_double, envelope_to_wkb, intersects, union, Envelope};
pub use error::{Result, SpatialError};
pub use ewkb::{
    dimension_system_of, envelope_of, parse_ewkb, DimensionSystem, GeometryType, Target,
};
pub use index::SpatialTreeIndex;
pub use key::{KeyBox, SpatialKey};
pub use map::{KeyIter, SpatialMap, SpatialStore};
pub use memory::{MemSpatialStore, MemStorage};
pub use table::{CostModel, IndexCondition, Session, SpatialRangeCost, Table};
pub use value::{GeometryValue, Row, Value};
