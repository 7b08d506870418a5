//! Collaborators the index consumes: session, table and cost model.

use crate::config::IndexColumn;
use crate::error::Result;
use crate::map::SpatialStore;
use crate::value::Row;
use std::sync::Arc;

/// Database session the index operations run in.
pub trait Session: Send + Sync {
    /// Session id (diagnostics).
    fn id(&self) -> u64;

    /// Whether the database is still starting up or recovering. Column
    /// metadata may be incomplete while this is true.
    fn database_starting(&self) -> bool;

    /// Open a handle on the store that holds the persistent spatial maps of
    /// the database.
    ///
    /// Each call returns a fresh handle. The index that receives it owns it
    /// and closes it on [`close`](crate::index::SpatialTreeIndex::close);
    /// other handles on the same store stay open.
    fn store(&self) -> Result<Arc<dyn SpatialStore>>;
}

/// Row lookup by id, honoring the session's visibility rules.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a full row. Fails with [`SpatialError::RowNotFound`] when no row
    /// is visible under that id.
    ///
    /// [`SpatialError::RowNotFound`]: crate::error::SpatialError::RowNotFound
    fn get_row(&self, session: &dyn Session, row_id: i64) -> Result<Row>;
}

/// Bits of a column predicate mask.
pub struct IndexCondition;

impl IndexCondition {
    pub const EQUALITY: u32 = 1;
    pub const START: u32 = 2;
    pub const END: u32 = 4;
    pub const RANGE: u32 = Self::START | Self::END;
    pub const ALWAYS_FALSE: u32 = 8;
    pub const SPATIAL_INTERSECTS: u32 = 16;
}

/// Estimates the cost of scanning a range index.
pub trait CostModel: Send + Sync {
    /// `masks` holds one predicate mask per table column id.
    fn range_index_cost(&self, masks: &[u32], columns: &[IndexColumn]) -> f64;
}

/// Default cost model for spatial indexes.
///
/// A spatial index is only useful with an intersection predicate on every
/// indexed column; without one the cost is prohibitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialRangeCost;

impl SpatialRangeCost {
    /// Cost reported when the spatial predicate is present.
    pub const SPATIAL_SCAN_COST: f64 = 2.0;
}

impl CostModel for SpatialRangeCost {
    fn range_index_cost(&self, masks: &[u32], columns: &[IndexColumn]) -> f64 {
        if columns.is_empty() {
            return f64::MAX;
        }
        for column in columns {
            let mask = masks.get(column.column.id).copied().unwrap_or(0);
            if mask & IndexCondition::SPATIAL_INTERSECTS != IndexCondition::SPATIAL_INTERSECTS {
                return f64::MAX;
            }
        }
        Self::SPATIAL_SCAN_COST
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Column, ValueType};

    #[test]
    fn test_spatial_range_cost() {
        let cost = SpatialRangeCost;
        let columns = vec![IndexColumn::new(Column::new(1, "G", ValueType::Geometry))];

        assert_eq!(cost.range_index_cost(&[0, 0], &columns), f64::MAX);
        assert_eq!(
            cost.range_index_cost(&[0, IndexCondition::EQUALITY], &columns),
            f64::MAX
        );
        assert_eq!(
            cost.range_index_cost(&[0, IndexCondition::SPATIAL_INTERSECTS], &columns),
            SpatialRangeCost::SPATIAL_SCAN_COST
        );
        // mask slice too short
        assert_eq!(cost.range_index_cost(&[IndexCondition::SPATIAL_INTERSECTS], &columns), f64::MAX);
        assert_eq!(cost.range_index_cost(&[IndexCondition::SPATIAL_INTERSECTS], &[]), f64::MAX);
    }
}
