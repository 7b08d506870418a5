//! Envelope (bounding box) algebra and the compact envelope encoding.
//!
//! An envelope is an axis-aligned rectangle `(min_x, max_x, min_y, max_y)`.
//! The absence of an envelope (null or empty geometry) is modeled as
//! `Option<Envelope>::None`; every operation here accepts it.
//!
//! # Compact encoding
//!
//! [`Envelope::to_wkb`] writes the smallest big-endian WKB geometry that
//! represents the box. The layouts are persisted as column values and must not
//! change:
//!
//! ```text
//! both axes degenerate  -> POINT       21 bytes: order(1) type(4) x(8) y(8)
//! one axis degenerate   -> LINESTRING  41 bytes: order(1) type(4) n=2(4) 2 x (x, y)
//! no degenerate axis    -> POLYGON     93 bytes: order(1) type(4) rings=1(4) n=5(4) 5 x (x, y)
//! ```
//!
//! Polygon corners are written as `(min_x,min_y) (min_x,max_y) (max_x,max_y)
//! (max_x,min_y) (min_x,min_y)`.

use crate::error::{Result, SpatialError};
use crate::ewkb::{LINE_STRING, POINT, POLYGON};
use serde::{Deserialize, Serialize};

/// Encoded length of a point envelope.
pub const POINT_WKB_LEN: usize = 21;

/// Encoded length of an envelope with exactly one degenerate axis.
pub const LINE_WKB_LEN: usize = 41;

/// Encoded length of a non-degenerate envelope.
pub const POLYGON_WKB_LEN: usize = 93;

/// WKB byte order marker for big endian (XDR).
const BIG_ENDIAN: u8 = 0;

/// Axis-aligned 2D bounding box.
///
/// Z and M never participate; see [`crate::ewkb::dimension_system_of`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create a new envelope without checking the bounds.
    ///
    /// Callers keep `min <= max` on both axes; see [`try_new`](Self::try_new)
    /// for bounds that come from outside.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Create a new envelope, rejecting inverted or NaN bounds.
    pub fn try_new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self> {
        if !(min_x <= max_x && min_y <= max_y) {
            return Err(SpatialError::decode(format!(
                "invalid envelope bounds: x {}..{}, y {}..{}",
                min_x, max_x, min_y, max_y
            )));
        }
        Ok(Self::new(min_x, max_x, min_y, max_y))
    }

    /// Degenerate envelope of a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, x, y, y)
    }

    /// Both axes collapsed to a single value.
    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// At least one axis collapsed to a single value.
    pub fn is_degenerate(&self) -> bool {
        self.min_x == self.max_x || self.min_y == self.max_y
    }

    /// Check if this envelope overlaps or touches another.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.max_x >= other.min_x
            && self.min_x <= other.max_x
            && self.max_y >= other.min_y
            && self.min_y <= other.max_y
    }

    /// Smallest envelope covering both inputs.
    pub fn union(&self, other: &Envelope) -> Envelope {
        let mut result = *self;
        if result.min_x > other.min_x {
            result.min_x = other.min_x;
        }
        if result.max_x < other.max_x {
            result.max_x = other.max_x;
        }
        if result.min_y > other.min_y {
            result.min_y = other.min_y;
        }
        if result.max_y < other.max_y {
            result.max_y = other.max_y;
        }
        result
    }

    /// Expand to include a coordinate. Bounds only ever widen.
    pub(crate) fn expand(&mut self, x: f64, y: f64) {
        if self.min_x > x {
            self.min_x = x;
        }
        if self.max_x < x {
            self.max_x = x;
        }
        if self.min_y > y {
            self.min_y = y;
        }
        if self.max_y < y {
            self.max_y = y;
        }
    }

    /// Encode as the smallest WKB geometry covering exactly this box.
    pub fn to_wkb(&self) -> Vec<u8> {
        let Envelope {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;

        if self.is_point() {
            let mut buf = Vec::with_capacity(POINT_WKB_LEN);
            write_header(&mut buf, POINT);
            write_xy(&mut buf, min_x, min_y);
            buf
        } else if self.is_degenerate() {
            let mut buf = Vec::with_capacity(LINE_WKB_LEN);
            write_header(&mut buf, LINE_STRING);
            buf.extend_from_slice(&2u32.to_be_bytes());
            write_xy(&mut buf, min_x, min_y);
            write_xy(&mut buf, max_x, max_y);
            buf
        } else {
            let mut buf = Vec::with_capacity(POLYGON_WKB_LEN);
            write_header(&mut buf, POLYGON);
            buf.extend_from_slice(&1u32.to_be_bytes());
            buf.extend_from_slice(&5u32.to_be_bytes());
            write_xy(&mut buf, min_x, min_y);
            write_xy(&mut buf, min_x, max_y);
            write_xy(&mut buf, max_x, max_y);
            write_xy(&mut buf, max_x, min_y);
            write_xy(&mut buf, min_x, min_y);
            buf
        }
    }
}

fn write_header(buf: &mut Vec<u8>, geometry_type: u32) {
    buf.push(BIG_ENDIAN);
    buf.extend_from_slice(&geometry_type.to_be_bytes());
}

fn write_xy(buf: &mut Vec<u8>, x: f64, y: f64) {
    // to_be_bytes keeps the raw bit pattern, NaN payloads included
    buf.extend_from_slice(&x.to_be_bytes());
    buf.extend_from_slice(&y.to_be_bytes());
}

/// Encode an optional envelope; the absent envelope has no encoding.
pub fn envelope_to_wkb(envelope: Option<&Envelope>) -> Option<Vec<u8>> {
    envelope.map(Envelope::to_wkb)
}

/// Check whether two optional envelopes intersect. Absent never intersects.
pub fn intersects(a: Option<&Envelope>, b: Option<&Envelope>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.intersects(b),
        _ => false,
    }
}

/// Union of two optional envelopes. An absent operand yields the other one.
pub fn union(a: Option<Envelope>, b: Option<Envelope>) -> Option<Envelope> {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => Some(a.union(&b)),
    }
}

/// Normalize every NaN to the canonical NaN and `-0.0` to `+0.0`.
pub fn canonical_double(d: f64) -> f64 {
    if d.is_nan() {
        f64::NAN
    } else if d == 0.0 {
        0.0
    } else {
        d
    }
}
