//! EWKB / WKB walker.
//!
//! [`parse_ewkb`] walks a binary geometry in document order and reports what it
//! sees to a [`Target`]. Targets are small accumulators; the ones shipped here
//! compute the envelope ([`EnvelopeTarget`]), the minimal dimension system
//! ([`DimensionSystemTarget`]) or both in a single pass
//! ([`EnvelopeAndDimensionSystemTarget`]).
//!
//! # Accepted input
//!
//! - byte order marker `0` (big endian) or `1` (little endian), per geometry
//! - PostGIS EWKB flags: `0x80000000` (Z), `0x40000000` (M), `0x20000000` (SRID follows)
//! - ISO type offsets: `1000` (Z), `2000` (M), `3000` (ZM)
//!
//! A point whose X and Y are both NaN is `POINT EMPTY` and reports no
//! coordinate. A polygon without rings is `POLYGON EMPTY`.
//!
//! Every coordinate passes through [`canonical_double`] before reaching the
//! target; absent Z and M arrive as NaN.

use crate::envelope::{canonical_double, Envelope};
use crate::error::{Result, SpatialError};
use serde::{Deserialize, Serialize};

/// POINT geometry type code.
pub const POINT: u32 = 1;
/// LINESTRING geometry type code.
pub const LINE_STRING: u32 = 2;
/// POLYGON geometry type code.
pub const POLYGON: u32 = 3;
/// MULTIPOINT geometry type code.
pub const MULTI_POINT: u32 = 4;
/// MULTILINESTRING geometry type code.
pub const MULTI_LINE_STRING: u32 = 5;
/// MULTIPOLYGON geometry type code.
pub const MULTI_POLYGON: u32 = 6;
/// GEOMETRYCOLLECTION geometry type code.
pub const GEOMETRY_COLLECTION: u32 = 7;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;
const EWKB_FLAGS: u32 = EWKB_Z | EWKB_M | EWKB_SRID;

/// Collections nested deeper than this are rejected.
const MAX_NESTING: usize = 64;

/// Geometry type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum GeometryType {
    Point = POINT,
    LineString = LINE_STRING,
    Polygon = POLYGON,
    MultiPoint = MULTI_POINT,
    MultiLineString = MULTI_LINE_STRING,
    MultiPolygon = MULTI_POLYGON,
    GeometryCollection = GEOMETRY_COLLECTION,
}

impl GeometryType {
    /// Map a 2D WKB type code.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            POINT => GeometryType::Point,
            LINE_STRING => GeometryType::LineString,
            POLYGON => GeometryType::Polygon,
            MULTI_POINT => GeometryType::MultiPoint,
            MULTI_LINE_STRING => GeometryType::MultiLineString,
            MULTI_POLYGON => GeometryType::MultiPolygon,
            GEOMETRY_COLLECTION => GeometryType::GeometryCollection,
            _ => return None,
        })
    }

    /// WKB type code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Required item type for the homogeneous multi-geometries.
    pub fn item_type(self) -> Option<GeometryType> {
        match self {
            GeometryType::MultiPoint => Some(GeometryType::Point),
            GeometryType::MultiLineString => Some(GeometryType::LineString),
            GeometryType::MultiPolygon => Some(GeometryType::Polygon),
            _ => None,
        }
    }

    /// Check if this is a multi-geometry or a geometry collection.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            GeometryType::MultiPoint
                | GeometryType::MultiLineString
                | GeometryType::MultiPolygon
                | GeometryType::GeometryCollection
        )
    }
}

/// Minimal coordinate dimension system of a geometry.
///
/// Bit 0 is set when Z is present, bit 1 when M is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DimensionSystem(u8);

impl DimensionSystem {
    pub const XY: DimensionSystem = DimensionSystem(0);
    pub const XYZ: DimensionSystem = DimensionSystem(1);
    pub const XYM: DimensionSystem = DimensionSystem(2);
    pub const XYZM: DimensionSystem = DimensionSystem(3);

    pub fn from_flags(has_z: bool, has_m: bool) -> Self {
        DimensionSystem(u8::from(has_z) | (u8::from(has_m) << 1))
    }

    pub fn has_z(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn has_m(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Receiver of parse events.
///
/// Every callback except [`add_coordinate`](Target::add_coordinate) defaults
/// to a no-op.
pub trait Target {
    /// Before the coordinate of a POINT.
    fn start_point(&mut self, _srid: i32) {}

    /// Before the coordinates of a LINESTRING.
    fn start_line_string(&mut self, _srid: i32, _num_points: usize) {}

    /// Before the outer ring of a POLYGON. Empty polygons report `(0, 0)`.
    fn start_polygon(&mut self, _srid: i32, _num_inner: usize, _num_points: usize) {}

    /// Before each inner ring (hole) of a POLYGON.
    fn start_polygon_inner(&mut self, _num_points: usize) {}

    /// After the last ring of a non-empty POLYGON.
    fn end_non_empty_polygon(&mut self) {}

    /// Before the items of a multi-geometry or geometry collection.
    fn start_collection(&mut self, _kind: GeometryType, _srid: i32, _num_items: usize) {}

    /// Before an item of a collection.
    ///
    /// Returning `Some` routes the item to a separate target, which is handed
    /// back through [`end_collection_item`](Target::end_collection_item).
    /// `None` keeps using this target.
    fn start_collection_item(&mut self, _index: usize, _total: usize) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    /// After an item of a collection, with the target returned by
    /// [`start_collection_item`](Target::start_collection_item).
    fn end_collection_item(&mut self, _item: Option<Self>, _index: usize, _total: usize)
    where
        Self: Sized,
    {
    }

    /// After the last item of a collection.
    fn end_collection(&mut self, _kind: GeometryType) {}

    /// A coordinate of the current sequence. `z` and `m` are NaN when absent.
    fn add_coordinate(&mut self, x: f64, y: f64, z: f64, m: f64, index: usize, total: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    fn from_u8(val: u8) -> Result<Self> {
        match val {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            _ => Err(SpatialError::decode(format!(
                "invalid WKB byte order: {}",
                val
            ))),
        }
    }
}

/// Bounds-checked reader over the input bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let bytes: [u8; N] = self
            .data
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| {
                SpatialError::decode(format!(
                    "truncated geometry: need {} bytes at offset {}, have {}",
                    N,
                    self.pos,
                    self.remaining()
                ))
            })?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u32(&mut self, order: ByteOrder) -> Result<u32> {
        let b = self.take::<4>()?;
        Ok(match order {
            ByteOrder::BigEndian => u32::from_be_bytes(b),
            ByteOrder::LittleEndian => u32::from_le_bytes(b),
        })
    }

    fn read_f64(&mut self, order: ByteOrder) -> Result<f64> {
        let b = self.take::<8>()?;
        Ok(match order {
            ByteOrder::BigEndian => f64::from_be_bytes(b),
            ByteOrder::LittleEndian => f64::from_le_bytes(b),
        })
    }

    /// Read an element count and reject counts the remaining input cannot hold.
    fn read_count(&mut self, order: ByteOrder, min_element_size: usize) -> Result<usize> {
        let count = self.read_u32(order)? as usize;
        if count > self.remaining() / min_element_size {
            return Err(SpatialError::decode(format!(
                "element count {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        Ok(count)
    }
}

/// Decoded geometry header.
#[derive(Debug, Clone, Copy)]
struct Header {
    order: ByteOrder,
    kind: GeometryType,
    use_z: bool,
    use_m: bool,
    srid: i32,
}

impl Header {
    fn coordinate_size(&self) -> usize {
        8 * (2 + usize::from(self.use_z) + usize::from(self.use_m))
    }
}

fn read_header(reader: &mut Reader<'_>, parent_srid: Option<i32>) -> Result<Header> {
    let order = ByteOrder::from_u8(reader.read_u8()?)?;
    let raw = reader.read_u32(order)?;
    let mut use_z = raw & EWKB_Z != 0;
    let mut use_m = raw & EWKB_M != 0;
    let srid = if raw & EWKB_SRID != 0 {
        let srid = reader.read_u32(order)? as i32;
        if let Some(parent) = parent_srid {
            if parent != srid {
                return Err(SpatialError::decode(format!(
                    "inconsistent SRID {} inside geometry with SRID {}",
                    srid, parent
                )));
            }
        }
        srid
    } else {
        parent_srid.unwrap_or(0)
    };

    let code = raw & !EWKB_FLAGS;
    match code / 1000 {
        0 => {}
        1 => use_z = true,
        2 => use_m = true,
        3 => {
            use_z = true;
            use_m = true;
        }
        _ => {
            return Err(SpatialError::decode(format!(
                "unknown geometry type code: {}",
                code
            )))
        }
    }
    let kind = GeometryType::from_code(code % 1000).ok_or_else(|| {
        SpatialError::decode(format!("unknown geometry type code: {}", code))
    })?;

    Ok(Header {
        order,
        kind,
        use_z,
        use_m,
        srid,
    })
}

/// Walk an EWKB (or plain WKB) geometry, reporting events to `target`.
///
/// Fails with [`SpatialError::Decode`] on malformed, truncated or
/// over-long input. Events already delivered before the failure are not
/// rolled back; callers discard the target on error.
pub fn parse_ewkb<T: Target>(ewkb: &[u8], target: &mut T) -> Result<()> {
    let mut reader = Reader::new(ewkb);
    parse_geometry(&mut reader, target, None, None, 0)?;
    if reader.remaining() != 0 {
        return Err(SpatialError::decode(format!(
            "{} trailing bytes after geometry",
            reader.remaining()
        )));
    }
    Ok(())
}

/// Read only the SRID of the top-level geometry (0 when none is present).
pub fn srid_of(ewkb: &[u8]) -> Result<i32> {
    let mut reader = Reader::new(ewkb);
    Ok(read_header(&mut reader, None)?.srid)
}

fn parse_geometry<T: Target>(
    reader: &mut Reader<'_>,
    target: &mut T,
    parent_srid: Option<i32>,
    expected: Option<GeometryType>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(SpatialError::decode("geometry nesting too deep"));
    }
    let header = read_header(reader, parent_srid)?;
    if let Some(expected) = expected {
        if header.kind != expected {
            return Err(SpatialError::decode(format!(
                "{:?} item inside a collection of {:?}",
                header.kind, expected
            )));
        }
    }
    let srid = header.srid;

    match header.kind {
        GeometryType::Point => {
            target.start_point(srid);
            let (x, y, z, m) = read_coordinate(reader, &header)?;
            if !(x.is_nan() && y.is_nan()) {
                target.add_coordinate(x, y, z, m, 0, 1);
            }
        }
        GeometryType::LineString => {
            let n = reader.read_count(header.order, header.coordinate_size())?;
            target.start_line_string(srid, n);
            add_coordinates(reader, target, &header, n)?;
        }
        GeometryType::Polygon => {
            let num_rings = reader.read_count(header.order, 4)?;
            if num_rings == 0 {
                target.start_polygon(srid, 0, 0);
                return Ok(());
            }
            let n = reader.read_count(header.order, header.coordinate_size())?;
            target.start_polygon(srid, num_rings - 1, n);
            add_coordinates(reader, target, &header, n)?;
            for _ in 1..num_rings {
                let n = reader.read_count(header.order, header.coordinate_size())?;
                target.start_polygon_inner(n);
                add_coordinates(reader, target, &header, n)?;
            }
            target.end_non_empty_polygon();
        }
        kind => {
            // smallest item: byte order + type code
            let num_items = reader.read_count(header.order, 5)?;
            target.start_collection(kind, srid, num_items);
            for index in 0..num_items {
                match target.start_collection_item(index, num_items) {
                    Some(mut item) => {
                        parse_geometry(reader, &mut item, Some(srid), kind.item_type(), depth + 1)?;
                        target.end_collection_item(Some(item), index, num_items);
                    }
                    None => {
                        parse_geometry(reader, target, Some(srid), kind.item_type(), depth + 1)?;
                        target.end_collection_item(None, index, num_items);
                    }
                }
            }
            target.end_collection(kind);
        }
    }
    Ok(())
}

fn read_coordinate(reader: &mut Reader<'_>, header: &Header) -> Result<(f64, f64, f64, f64)> {
    let x = canonical_double(reader.read_f64(header.order)?);
    let y = canonical_double(reader.read_f64(header.order)?);
    let z = if header.use_z {
        canonical_double(reader.read_f64(header.order)?)
    } else {
        f64::NAN
    };
    let m = if header.use_m {
        canonical_double(reader.read_f64(header.order)?)
    } else {
        f64::NAN
    };
    Ok((x, y, z, m))
}

fn add_coordinates<T: Target>(
    reader: &mut Reader<'_>,
    target: &mut T,
    header: &Header,
    total: usize,
) -> Result<()> {
    for index in 0..total {
        let (x, y, z, m) = read_coordinate(reader, header)?;
        target.add_coordinate(x, y, z, m, index, total);
    }
    Ok(())
}

// ============================================================================
// Targets
// ============================================================================

/// Computes the envelope of a geometry. Polygon holes are not counted.
#[derive(Debug, Default, Clone)]
pub struct EnvelopeTarget {
    enabled: bool,
    envelope: Option<Envelope>,
}

impl EnvelopeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// The envelope, or `None` for empty geometries.
    pub fn envelope(&self) -> Option<Envelope> {
        self.envelope
    }
}

impl Target for EnvelopeTarget {
    fn start_point(&mut self, _srid: i32) {
        self.enabled = true;
    }

    fn start_line_string(&mut self, _srid: i32, _num_points: usize) {
        self.enabled = true;
    }

    fn start_polygon(&mut self, _srid: i32, _num_inner: usize, _num_points: usize) {
        self.enabled = true;
    }

    fn start_polygon_inner(&mut self, _num_points: usize) {
        self.enabled = false;
    }

    fn add_coordinate(&mut self, x: f64, y: f64, _z: f64, _m: f64, _index: usize, _total: usize) {
        if !self.enabled {
            return;
        }
        match &mut self.envelope {
            Some(env) => env.expand(x, y),
            None => self.envelope = Some(Envelope::point(x, y)),
        }
    }
}

/// Determines the minimal dimension system of a geometry.
#[derive(Debug, Default, Clone)]
pub struct DimensionSystemTarget {
    has_z: bool,
    has_m: bool,
}

impl DimensionSystemTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension_system(&self) -> DimensionSystem {
        DimensionSystem::from_flags(self.has_z, self.has_m)
    }
}

impl Target for DimensionSystemTarget {
    fn add_coordinate(&mut self, _x: f64, _y: f64, z: f64, m: f64, _index: usize, _total: usize) {
        if !self.has_z && !z.is_nan() {
            self.has_z = true;
        }
        if !self.has_m && !m.is_nan() {
            self.has_m = true;
        }
    }
}

/// Envelope and dimension system in a single pass.
#[derive(Debug, Default, Clone)]
pub struct EnvelopeAndDimensionSystemTarget {
    envelope: EnvelopeTarget,
    dimensions: DimensionSystemTarget,
}

impl EnvelopeAndDimensionSystemTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.envelope.envelope()
    }

    pub fn dimension_system(&self) -> DimensionSystem {
        self.dimensions.dimension_system()
    }
}

impl Target for EnvelopeAndDimensionSystemTarget {
    fn start_point(&mut self, srid: i32) {
        self.envelope.start_point(srid);
    }

    fn start_line_string(&mut self, srid: i32, num_points: usize) {
        self.envelope.start_line_string(srid, num_points);
    }

    fn start_polygon(&mut self, srid: i32, num_inner: usize, num_points: usize) {
        self.envelope.start_polygon(srid, num_inner, num_points);
    }

    fn start_polygon_inner(&mut self, num_points: usize) {
        self.envelope.start_polygon_inner(num_points);
    }

    fn add_coordinate(&mut self, x: f64, y: f64, z: f64, m: f64, index: usize, total: usize) {
        self.dimensions.add_coordinate(x, y, z, m, index, total);
        self.envelope.add_coordinate(x, y, z, m, index, total);
    }
}

/// Envelope of an EWKB geometry, `None` when the geometry is empty.
pub fn envelope_of(ewkb: &[u8]) -> Result<Option<Envelope>> {
    let mut target = EnvelopeTarget::new();
    parse_ewkb(ewkb, &mut target)?;
    Ok(target.envelope())
}

/// Minimal dimension system of an EWKB geometry.
pub fn dimension_system_of(ewkb: &[u8]) -> Result<DimensionSystem> {
    let mut target = DimensionSystemTarget::new();
    parse_ewkb(ewkb, &mut target)?;
    Ok(target.dimension_system())
}

/// Envelope and dimension system of an EWKB geometry in one pass.
pub fn envelope_and_dimension_system_of(
    ewkb: &[u8],
) -> Result<(Option<Envelope>, DimensionSystem)> {
    let mut target = EnvelopeAndDimensionSystemTarget::new();
    parse_ewkb(ewkb, &mut target)?;
    Ok((target.envelope(), target.dimension_system()))
}

#[cfg(test)]
pub(crate) mod test_wkb {
    //! Little-endian WKB builders for tests.

    pub fn header(buf: &mut Vec<u8>, code: u32) {
        buf.push(1);
        buf.extend_from_slice(&code.to_le_bytes());
    }

    pub fn coords(buf: &mut Vec<u8>, values: &[f64]) {
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn count(buf: &mut Vec<u8>, n: u32) {
        buf.extend_from_slice(&n.to_le_bytes());
    }

    pub fn point(x: f64, y: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, 1);
        coords(&mut buf, &[x, y]);
        buf
    }

    pub fn line(points: &[(f64, f64)]) -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, 2);
        count(&mut buf, points.len() as u32);
        for (x, y) in points {
            coords(&mut buf, &[*x, *y]);
        }
        buf
    }

    pub fn polygon(rings: &[&[(f64, f64)]]) -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, 3);
        count(&mut buf, rings.len() as u32);
        for ring in rings {
            count(&mut buf, ring.len() as u32);
            for (x, y) in ring.iter() {
                coords(&mut buf, &[*x, *y]);
            }
        }
        buf
    }

    pub fn collection(code: u32, items: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, code);
        count(&mut buf, items.len() as u32);
        for item in items {
            buf.extend_from_slice(item);
        }
        buf
    }
}
