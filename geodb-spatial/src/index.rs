//! Spatial tree index over one geometry column.
//!
//! Translates row events into spatial keys and forwards them to a backing
//! [`SpatialMap`]:
//!
//! ```text
//! add/remove(row) ──► spatial_key(row) ──► map.add / map.remove (exact match)
//! find_by_geometry(row) ──► spatial_key(row) ──► map.iter_intersecting ──► SpatialCursor ──► table.get_row
//! ```
//!
//! # Rebuild flag
//!
//! [`need_rebuild`](SpatialTreeIndex::need_rebuild) is raised when the index
//! is created, and when a persistent map is found empty on reopen (its content
//! was never written, e.g. after recovery). The index never lowers it by
//! itself: the coordinator that re-adds every table row calls
//! [`mark_rebuilt`](SpatialTreeIndex::mark_rebuilt) once the scan succeeded.

use crate::config::{IndexColumn, SpatialIndexConfig};
use crate::cursor::SpatialCursor;
use crate::error::{Result, SpatialError};
use crate::key::SpatialKey;
use crate::map::{SpatialMap, SpatialStore};
use crate::memory::MemSpatialStore;
use crate::table::{CostModel, Session, SpatialRangeCost, Table};
use crate::value::Row;
use std::sync::Arc;

pub struct SpatialTreeIndex {
    id: i32,
    name: String,
    columns: Vec<IndexColumn>,
    /// Row position of the indexed column.
    column_id: usize,
    table: Arc<dyn Table>,
    store: Arc<dyn SpatialStore>,
    map: Box<dyn SpatialMap>,
    cost_model: Arc<dyn CostModel>,
    need_rebuild: bool,
    closed: bool,
}

impl SpatialTreeIndex {
    /// Open (or create) the index described by `config` on `table`.
    ///
    /// Persistent indexes open the map `RTREE_<id>` through a store handle
    /// obtained from the session; non-persistent ones get a private in-memory
    /// store. Either way the index owns its handle.
    pub fn open(
        table: Arc<dyn Table>,
        config: SpatialIndexConfig,
        session: &dyn Session,
    ) -> Result<Self> {
        config.validate(session.database_starting())?;
        let column_id = config
            .columns
            .first()
            .map(|c| c.column.id)
            .ok_or_else(|| SpatialError::internal("validated config without column"))?;

        let store: Arc<dyn SpatialStore> = if config.persistent {
            session.store()?
        } else {
            Arc::new(MemSpatialStore::ephemeral())
        };
        let map_name = config.map_name();
        let map = store.open_map(&map_name)?;

        let mut need_rebuild = config.create;
        if config.persistent && map.is_empty() {
            if !need_rebuild {
                tracing::info!(
                    index = %config.name,
                    map = %map_name,
                    "spatial index map is empty on reopen, rebuild required"
                );
            }
            need_rebuild = true;
        }

        tracing::debug!(
            index = %config.name,
            id = config.id,
            table = table.name(),
            map = %map_name,
            persistent = config.persistent,
            create = config.create,
            need_rebuild,
            "opened spatial index"
        );

        Ok(Self {
            id: config.id,
            name: config.name,
            columns: config.columns,
            column_id,
            table,
            store,
            map,
            cost_model: Arc::new(SpatialRangeCost),
            need_rebuild,
            closed: false,
        })
    }

    /// Replace the cost model used by [`cost`](Self::cost).
    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The indexed column.
    pub fn column(&self) -> &IndexColumn {
        &self.columns[0]
    }

    pub fn map_name(&self) -> &str {
        self.map.name()
    }

    /// Whether the index was closed, or its map was closed or dropped
    /// underneath it.
    pub fn is_closed(&self) -> bool {
        self.closed || self.map.is_closed()
    }

    pub fn need_rebuild(&self) -> bool {
        self.need_rebuild
    }

    /// Called by the rebuild coordinator after every row was re-added.
    pub fn mark_rebuilt(&mut self) {
        if self.need_rebuild {
            tracing::info!(index = %self.name, rows = self.map.len(), "spatial index rebuilt");
        }
        self.need_rebuild = false;
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(SpatialError::closed(format!(
                "spatial index {} is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Key of a row: its id plus the envelope of the indexed column.
    ///
    /// NULL and empty geometries give a key without a box.
    pub fn spatial_key(&self, row: &Row) -> Result<SpatialKey> {
        let envelope = row.value(self.column_id).envelope()?;
        Ok(SpatialKey::new(row.key(), envelope.as_ref()))
    }

    /// Index a row. Rows sharing a box are stored side by side.
    pub fn add(&self, session: &dyn Session, row: &Row) -> Result<()> {
        self.check_open()?;
        let key = self.spatial_key(row)?;
        tracing::trace!(index = %self.name, session = session.id(), row_id = key.row_id(), "add");
        self.map.add(key)
    }

    /// Remove a row's key.
    ///
    /// A missing key means the index and the table have diverged and is
    /// reported as [`SpatialError::Integrity`].
    pub fn remove(&self, session: &dyn Session, row: &Row) -> Result<()> {
        self.check_open()?;
        let key = self.spatial_key(row)?;
        tracing::trace!(index = %self.name, session = session.id(), row_id = key.row_id(), "remove");
        if !self.map.remove(&key)? {
            tracing::error!(
                index = %self.name,
                table = self.table.name(),
                row_id = key.row_id(),
                "row not found in spatial index"
            );
            return Err(SpatialError::integrity(format!(
                "row {} not found in spatial index {}",
                key.row_id(),
                self.name
            )));
        }
        Ok(())
    }

    /// Cursor over every indexed row.
    pub fn find<'a>(&'a self, session: &'a dyn Session) -> Result<SpatialCursor<'a>> {
        self.check_open()?;
        Ok(SpatialCursor::new(
            self.map.iter_all()?,
            self.table.as_ref(),
            session,
        ))
    }

    /// Cursor over rows whose box intersects the box of `intersection`.
    ///
    /// Without an intersection row this is [`find`](Self::find). A row with a
    /// NULL or empty geometry matches nothing.
    pub fn find_by_geometry<'a>(
        &'a self,
        session: &'a dyn Session,
        intersection: Option<&Row>,
    ) -> Result<SpatialCursor<'a>> {
        let Some(row) = intersection else {
            return self.find(session);
        };
        self.check_open()?;
        let query = self.spatial_key(row)?;
        tracing::trace!(index = %self.name, session = session.id(), bounds = ?query.bounds(), "find by geometry");
        Ok(SpatialCursor::new(
            self.map.iter_intersecting(&query)?,
            self.table.as_ref(),
            session,
        ))
    }

    /// Cost of using this index, given one predicate mask per table column.
    pub fn cost(&self, masks: &[u32]) -> f64 {
        self.cost_model.range_index_cost(masks, &self.columns)
    }

    /// Remove every key.
    pub fn truncate(&self, session: &dyn Session) -> Result<()> {
        self.check_open()?;
        tracing::debug!(index = %self.name, session = session.id(), "truncate spatial index");
        self.map.clear()
    }

    /// Exact number of keys.
    pub fn row_count(&self) -> u64 {
        self.map.len()
    }

    /// Same as [`row_count`](Self::row_count); the count is always exact.
    pub fn row_count_approximation(&self) -> u64 {
        self.map.len()
    }

    /// Not estimated.
    pub fn disk_space_used(&self) -> u64 {
        0
    }

    /// Drop the backing map from the store. No-op when the map is already
    /// closed.
    pub fn drop_index(&self, session: &dyn Session) -> Result<()> {
        if self.map.is_closed() {
            return Ok(());
        }
        tracing::debug!(index = %self.name, session = session.id(), map = self.map.name(), "drop spatial index");
        self.store.remove_map(self.map.as_ref())
    }

    /// Release the index's store handle. Later mutations fail with
    /// [`SpatialError::Closed`].
    pub fn close(&mut self, session: &dyn Session) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        tracing::debug!(index = %self.name, session = session.id(), "close spatial index");
        self.store.close()?;
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for SpatialTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialTreeIndex")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("table", &self.table.name())
            .field("map", &self.map.name())
            .field("need_rebuild", &self.need_rebuild)
            .field("closed", &self.closed)
            .finish()
    }
}
