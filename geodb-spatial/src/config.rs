//! Spatial index configuration types.
//!
//! Defines the declaration of a spatial index (its column, ordering and
//! persistence flags) and the checks applied before an index is opened.

use crate::error::{Result, SpatialError};
use serde::{Deserialize, Serialize};

/// Prefix of the backing map name of a persistent index.
pub const MAP_PREFIX: &str = "RTREE_";

/// Name of the backing map of a non-persistent index.
pub const EPHEMERAL_MAP_NAME: &str = "spatialIndex";

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Int,
    Double,
    Varchar,
    Binary,
    Geometry,
}

/// Table column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Position of the column in a row.
    pub id: usize,
    pub name: String,
    pub value_type: ValueType,
}

impl Column {
    pub fn new(id: usize, name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id,
            name: name.into(),
            value_type,
        }
    }

    /// Column definition as it would appear in DDL.
    pub fn create_sql(&self) -> String {
        format!("\"{}\" {}", self.name, self.value_type.sql_name())
    }
}

impl ValueType {
    fn sql_name(self) -> &'static str {
        match self {
            ValueType::Null => "NULL",
            ValueType::Int => "BIGINT",
            ValueType::Double => "DOUBLE PRECISION",
            ValueType::Varchar => "CHARACTER VARYING",
            ValueType::Binary => "BINARY VARYING",
            ValueType::Geometry => "GEOMETRY",
        }
    }
}

/// Sort flags of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortType(pub u8);

impl SortType {
    pub const ASCENDING: SortType = SortType(0);
    pub const DESCENDING: SortType = SortType(1);
    pub const NULLS_FIRST: SortType = SortType(2);
    pub const NULLS_LAST: SortType = SortType(4);

    pub fn contains(self, flag: SortType) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn with(self, flag: SortType) -> SortType {
        SortType(self.0 | flag.0)
    }
}

/// An indexed column with its sort flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub column: Column,
    pub sort_type: SortType,
}

impl IndexColumn {
    pub fn new(column: Column) -> Self {
        Self {
            column,
            sort_type: SortType::ASCENDING,
        }
    }

    pub fn with_sort_type(mut self, sort_type: SortType) -> Self {
        self.sort_type = sort_type;
        self
    }
}

/// Declaration of a spatial index.
///
/// Stored with the table metadata and used when the index is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialIndexConfig {
    /// Index id. Persistent indexes name their map after it.
    pub id: i32,

    /// Index name (for diagnostics).
    pub name: String,

    /// Indexed columns. Exactly one geometry column is supported.
    pub columns: Vec<IndexColumn>,

    /// Unique spatial indexes are not supported.
    pub unique: bool,

    /// Whether the index lives in the database store.
    /// Default: true
    pub persistent: bool,

    /// Whether the index is being created (as opposed to reopened).
    /// Default: true
    pub create: bool,
}

impl SpatialIndexConfig {
    /// Create a new config for a persistent, freshly created index on one column.
    pub fn new(id: i32, name: impl Into<String>, column: Column) -> Self {
        Self {
            id,
            name: name.into(),
            columns: vec![IndexColumn::new(column)],
            unique: false,
            persistent: true,
            create: true,
        }
    }

    pub fn with_columns(mut self, columns: Vec<IndexColumn>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Name of the backing map.
    pub fn map_name(&self) -> String {
        if self.persistent {
            format!("{}{}", MAP_PREFIX, self.id)
        } else {
            EPHEMERAL_MAP_NAME.to_string()
        }
    }

    /// Reject unsupported declarations.
    ///
    /// The column type check is skipped while the database is `starting`:
    /// column metadata may not be resolved yet during recovery.
    pub fn validate(&self, starting: bool) -> Result<()> {
        if self.unique {
            return Err(SpatialError::config("not unique"));
        }
        if !self.persistent && !self.create {
            return Err(SpatialError::config(
                "non persistent index called with create == false",
            ));
        }
        let column = match self.columns.as_slice() {
            [column] => column,
            [] => return Err(SpatialError::config("spatial index without column")),
            _ => return Err(SpatialError::config("can only do one column")),
        };
        if column.sort_type.contains(SortType::DESCENDING) {
            return Err(SpatialError::config("cannot do descending"));
        }
        if column.sort_type.contains(SortType::NULLS_FIRST) {
            return Err(SpatialError::config("cannot do nulls first"));
        }
        if column.sort_type.contains(SortType::NULLS_LAST) {
            return Err(SpatialError::config("cannot do nulls last"));
        }
        if !starting && column.column.value_type != ValueType::Geometry {
            return Err(SpatialError::config(format!(
                "spatial index on non-geometry column, {}",
                column.column.create_sql()
            )));
        }
        if self.persistent && self.id < 0 {
            return Err(SpatialError::config(format!(
                "persistent index with id {} < 0",
                self.id
            )));
        }
        Ok(())
    }
}
