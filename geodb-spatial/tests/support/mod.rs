//! Shared test harness for geodb-spatial integration tests.
//!
//! Provides an in-memory table, a session over a shared store, row builders
//! and a tracing layer that captures events for assertions.

// Not every test crate uses every helper.
#![allow(dead_code)]

use geodb_spatial::{
    Column, Envelope, GeometryValue, MemSpatialStore, MemStorage, Result, Row, Session,
    SpatialCursor, SpatialError, SpatialIndexConfig, SpatialStore, SpatialTreeIndex, Table, Value,
    ValueType,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

// =============================================================================
// Table and session doubles
// =============================================================================

/// Table whose rows live in a hash map.
pub struct MemTable {
    name: String,
    rows: RwLock<FxHashMap<i64, Row>>,
}

impl MemTable {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rows: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn insert(&self, row: Row) {
        self.rows.write().insert(row.key(), row);
    }

    pub fn delete(&self, row_id: i64) -> Option<Row> {
        self.rows.write().remove(&row_id)
    }

    /// All rows ordered by id (the scan a rebuild would perform).
    pub fn scan(&self) -> Vec<Row> {
        let mut rows: Vec<Row> = self.rows.read().values().cloned().collect();
        rows.sort_by_key(|r| r.key());
        rows
    }
}

impl Table for MemTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_row(&self, _session: &dyn Session, row_id: i64) -> Result<Row> {
        self.rows
            .read()
            .get(&row_id)
            .cloned()
            .ok_or(SpatialError::RowNotFound(row_id))
    }
}

/// Session whose store handles all open `storage`.
pub struct TestSession {
    pub id: u64,
    pub starting: bool,
    pub storage: Arc<MemStorage>,
}

impl TestSession {
    pub fn new(storage: Arc<MemStorage>) -> Self {
        Self {
            id: 1,
            starting: false,
            storage,
        }
    }

    pub fn starting(mut self) -> Self {
        self.starting = true;
        self
    }
}

impl Session for TestSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn database_starting(&self) -> bool {
        self.starting
    }

    fn store(&self) -> Result<Arc<dyn SpatialStore>> {
        Ok(Arc::new(MemSpatialStore::open(self.storage.clone())))
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Geometry column at row position 1 (position 0 holds the id as INT).
pub fn geom_column() -> Column {
    Column::new(1, "GEOM", ValueType::Geometry)
}

pub fn config(id: i32) -> SpatialIndexConfig {
    SpatialIndexConfig::new(id, format!("IDX_{}", id), geom_column())
}

pub fn env(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Envelope {
    Envelope::new(min_x, max_x, min_y, max_y)
}

/// Row whose geometry is the compact encoding of `envelope`.
pub fn geom_row(id: i64, envelope: Envelope) -> Row {
    Row::new(
        id,
        vec![
            Value::Int(id),
            Value::Geometry(GeometryValue::from_envelope(&envelope)),
        ],
    )
}

pub fn null_row(id: i64) -> Row {
    Row::new(id, vec![Value::Int(id), Value::Null])
}

/// Query row carrying only a geometry.
pub fn query_row(envelope: Envelope) -> Row {
    geom_row(-1, envelope)
}

/// Drain a cursor into sorted row ids, failing on lookup errors.
pub fn row_ids(cursor: SpatialCursor<'_>) -> Vec<i64> {
    let mut ids: Vec<i64> = cursor
        .map(|row| row.expect("row lookup").key())
        .collect();
    ids.sort();
    ids
}

/// Insert into the table and the index.
pub fn insert(table: &MemTable, index: &SpatialTreeIndex, session: &TestSession, row: Row) {
    index.add(session, &row).expect("index add");
    table.insert(row);
}

// =============================================================================
// Tracing capture
// =============================================================================

/// A recorded event with its level, message and fields.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
    pub fields: FxHashMap<String, String>,
}

/// Shared storage for captured events.
#[derive(Debug, Clone, Default)]
pub struct EventStore(Arc<Mutex<Vec<CapturedEvent>>>);

impl EventStore {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().clone()
    }

    /// First event whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Option<CapturedEvent> {
        self.0
            .lock()
            .iter()
            .find(|e| e.message.contains(needle))
            .cloned()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: FxHashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value);
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

struct EventCaptureLayer {
    store: EventStore,
}

impl<S: Subscriber> Layer<S> for EventCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.store.0.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Capture every event emitted while the returned guard is alive.
pub fn init_test_tracing() -> (EventStore, tracing::subscriber::DefaultGuard) {
    let store = EventStore::default();
    let layer = EventCaptureLayer {
        store: store.clone(),
    };
    let subscriber = tracing_subscriber::registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}
