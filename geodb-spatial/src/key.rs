//! Spatial keys: the entries stored in the backing map.
//!
//! A key pairs a row id with the row's envelope narrowed to `f32`. The index
//! resolution is coarser than the stored geometry; the query side
//! narrows the same way, so a row always finds itself.
//!
//! Keys compare by `(row_id, bounds)`. Two rows with the same envelope are two
//! distinct keys.

use crate::envelope::Envelope;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// `f32` bounding box of a key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl KeyBox {
    /// Narrow a `f64` envelope to key precision.
    pub fn from_envelope(env: &Envelope) -> Self {
        Self {
            min_x: env.min_x as f32,
            max_x: env.max_x as f32,
            min_y: env.min_y as f32,
            max_y: env.max_y as f32,
        }
    }

    /// Inclusive overlap test, edges touching count.
    pub fn intersects(&self, other: &KeyBox) -> bool {
        self.max_x >= other.min_x
            && self.min_x <= other.max_x
            && self.max_y >= other.min_y
            && self.min_y <= other.max_y
    }

    /// Widen back to an envelope.
    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            min_x: f64::from(self.min_x),
            max_x: f64::from(self.max_x),
            min_y: f64::from(self.min_y),
            max_y: f64::from(self.max_y),
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.min_x
            .total_cmp(&other.min_x)
            .then_with(|| self.max_x.total_cmp(&other.max_x))
            .then_with(|| self.min_y.total_cmp(&other.min_y))
            .then_with(|| self.max_y.total_cmp(&other.max_y))
    }
}

/// Index entry: row id plus optional box.
///
/// A key without a box (NULL or empty geometry) is found by exact match only;
/// it never intersects anything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpatialKey {
    row_id: i64,
    bounds: Option<KeyBox>,
}

impl SpatialKey {
    pub fn new(row_id: i64, envelope: Option<&Envelope>) -> Self {
        Self {
            row_id,
            bounds: envelope.map(KeyBox::from_envelope),
        }
    }

    /// Key that carries only a row id.
    pub fn id_only(row_id: i64) -> Self {
        Self {
            row_id,
            bounds: None,
        }
    }

    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    pub fn bounds(&self) -> Option<&KeyBox> {
        self.bounds.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.bounds.is_none()
    }

    /// Box overlap, ignoring row ids. Keys without a box never intersect.
    pub fn intersects(&self, other: &SpatialKey) -> bool {
        match (&self.bounds, &other.bounds) {
            (Some(a), Some(b)) => a.intersects(b),
            _ => false,
        }
    }
}

// Ordering uses f32::total_cmp so that keys can live in ordered collections;
// equality agrees with it.
impl Ord for SpatialKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row_id
            .cmp(&other.row_id)
            .then_with(|| match (&self.bounds, &other.bounds) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.total_cmp(b),
            })
    }
}

impl PartialOrd for SpatialKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SpatialKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SpatialKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_includes_row_id() {
        let env = Envelope::new(1.0, 2.0, 1.0, 2.0);
        let a = SpatialKey::new(1, Some(&env));
        let b = SpatialKey::new(2, Some(&env));
        assert_ne!(a, b);
        assert_eq!(a, SpatialKey::new(1, Some(&env)));
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_null_key() {
        let key = SpatialKey::new(5, None);
        assert!(key.is_null());
        assert_eq!(key, SpatialKey::id_only(5));
        assert!(!key.intersects(&key));
        let boxed = SpatialKey::new(5, Some(&Envelope::point(0.0, 0.0)));
        assert_ne!(key, boxed);
        assert!(key < boxed);
    }

    #[test]
    fn test_narrowing_to_f32() {
        let env = Envelope::new(0.1, 0.3, 1.0 / 3.0, 2.0 / 3.0);
        let key = SpatialKey::new(1, Some(&env));
        let b = key.bounds().unwrap();
        assert_eq!(b.min_x, 0.1f32);
        assert_eq!(b.max_y, (2.0f64 / 3.0) as f32);
        assert_ne!(b.to_envelope(), env);
    }

    #[test]
    fn test_box_touching_edges_intersect() {
        let a = KeyBox::from_envelope(&Envelope::new(0.0, 10.0, 0.0, 10.0));
        let b = KeyBox::from_envelope(&Envelope::new(10.0, 20.0, 10.0, 20.0));
        let c = KeyBox::from_envelope(&Envelope::new(10.5, 20.0, 0.0, 10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }
}
