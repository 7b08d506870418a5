//! Column values and rows as seen by the spatial index.
//!
//! Only the geometry side of the value system matters here: a [`Value`] can be
//! converted into a [`GeometryValue`], which caches the envelope so that key
//! derivation does not reparse the EWKB on every index operation.

use crate::config::ValueType;
use crate::envelope::Envelope;
use crate::error::{Result, SpatialError};
use crate::ewkb::{self, DimensionSystem};
use std::sync::Arc;

/// Geometry column value.
///
/// Holds the EWKB bytes as the source of truth plus metadata computed once at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryValue {
    ewkb: Arc<[u8]>,
    srid: i32,
    envelope: Option<Envelope>,
    dimension_system: DimensionSystem,
}

impl GeometryValue {
    /// Validate EWKB bytes and compute envelope, SRID and dimension system.
    pub fn from_ewkb(ewkb: impl Into<Arc<[u8]>>) -> Result<Self> {
        let ewkb = ewkb.into();
        let (envelope, dimension_system) = ewkb::envelope_and_dimension_system_of(&ewkb)?;
        let srid = ewkb::srid_of(&ewkb)?;
        Ok(Self {
            ewkb,
            srid,
            envelope,
            dimension_system,
        })
    }

    /// Geometry for an envelope, using the compact encoding.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            ewkb: envelope.to_wkb().into(),
            srid: 0,
            envelope: Some(*envelope),
            dimension_system: DimensionSystem::XY,
        }
    }

    pub fn ewkb(&self) -> &[u8] {
        &self.ewkb
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Envelope, or `None` for empty geometries.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn dimension_system(&self) -> DimensionSystem {
        self.dimension_system
    }

    pub fn is_empty(&self) -> bool {
        self.envelope.is_none()
    }
}

/// A column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Varchar(String),
    /// Raw bytes; treated as EWKB when converted to a geometry.
    Binary(Vec<u8>),
    Geometry(GeometryValue),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::Varchar(_) => ValueType::Varchar,
            Value::Binary(_) => ValueType::Binary,
            Value::Geometry(_) => ValueType::Geometry,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to a geometry. `Ok(None)` for NULL.
    pub fn to_geometry(&self) -> Result<Option<GeometryValue>> {
        match self {
            Value::Null => Ok(None),
            Value::Geometry(g) => Ok(Some(g.clone())),
            Value::Binary(bytes) => GeometryValue::from_ewkb(bytes.as_slice()).map(Some),
            other => Err(SpatialError::decode(format!(
                "{:?} value cannot be converted to GEOMETRY",
                other.value_type()
            ))),
        }
    }

    /// Envelope of this value viewed as a geometry.
    ///
    /// NULL and empty geometries have no envelope.
    pub fn envelope(&self) -> Result<Option<Envelope>> {
        match self {
            Value::Null => Ok(None),
            Value::Geometry(g) => Ok(g.envelope().copied()),
            Value::Binary(bytes) => ewkb::envelope_of(bytes),
            _ => Ok(self.to_geometry()?.and_then(|g| g.envelope().copied())),
        }
    }
}

impl From<GeometryValue> for Value {
    fn from(g: GeometryValue) -> Self {
        Value::Geometry(g)
    }
}

static NULL: Value = Value::Null;

/// A table row: its key (row id) and column values by column id.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    key: i64,
    values: Vec<Value>,
}

impl Row {
    pub fn new(key: i64, values: Vec<Value>) -> Self {
        Self { key, values }
    }

    /// Row id.
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Value of a column, `Null` when the row is shorter than the column id.
    pub fn value(&self, column_id: usize) -> &Value {
        self.values.get(column_id).unwrap_or(&NULL)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
