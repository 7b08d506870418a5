//! In-memory spatial store.
//!
//! [`MemStorage`] plays the role of the durable medium: it outlives store
//! handles, so closing a [`MemSpatialStore`] and opening a new one over the
//! same storage behaves like a database restart. [`MemSpatialStore::ephemeral`]
//! creates a private storage for non-persistent indexes.
//!
//! Scans filter linearly over an ordered multiset of keys.

use crate::error::{Result, SpatialError};
use crate::key::SpatialKey;
use crate::map::{KeyIter, SpatialMap, SpatialStore};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ordered multiset of keys with a cached entry count.
#[derive(Debug, Default)]
struct Entries {
    keys: BTreeMap<SpatialKey, u32>,
    size: u64,
}

impl Entries {
    fn insert(&mut self, key: SpatialKey) {
        *self.keys.entry(key).or_insert(0) += 1;
        self.size += 1;
    }

    fn remove(&mut self, key: &SpatialKey) -> bool {
        let Some(count) = self.keys.get_mut(key) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.keys.remove(key);
        }
        self.size -= 1;
        true
    }

    fn collect(&self, mut filter: impl FnMut(&SpatialKey) -> bool) -> Vec<SpatialKey> {
        let mut out = Vec::new();
        for (key, &count) in &self.keys {
            if filter(key) {
                out.extend(std::iter::repeat(*key).take(count as usize));
            }
        }
        out
    }
}

#[derive(Debug, Default)]
struct MapData {
    entries: RwLock<Entries>,
    removed: AtomicBool,
}

/// Durable side of the in-memory store: named maps and their keys.
#[derive(Debug, Default)]
pub struct MemStorage {
    maps: RwLock<FxHashMap<String, Arc<MapData>>>,
}

impl MemStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names of the maps currently stored.
    pub fn map_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.maps.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a map with this name exists.
    pub fn contains_map(&self, name: &str) -> bool {
        self.maps.read().contains_key(name)
    }
}

/// Handle over a [`MemStorage`].
#[derive(Debug)]
pub struct MemSpatialStore {
    storage: Arc<MemStorage>,
    closed: Arc<AtomicBool>,
}

impl MemSpatialStore {
    /// Open a store over existing storage.
    pub fn open(storage: Arc<MemStorage>) -> Self {
        Self {
            storage,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Store over a fresh, private storage.
    pub fn ephemeral() -> Self {
        Self::open(MemStorage::new())
    }

    pub fn storage(&self) -> &Arc<MemStorage> {
        &self.storage
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SpatialError::closed("spatial store is closed"));
        }
        Ok(())
    }
}

impl SpatialStore for MemSpatialStore {
    fn open_map(&self, name: &str) -> Result<Box<dyn SpatialMap>> {
        self.check_open()?;
        let data = self
            .storage
            .maps
            .write()
            .entry(name.to_string())
            .or_default()
            .clone();
        tracing::trace!(map = name, "opened in-memory spatial map");
        Ok(Box::new(MemSpatialMap {
            name: name.to_string(),
            data,
            store_closed: Arc::clone(&self.closed),
        }))
    }

    fn remove_map(&self, map: &dyn SpatialMap) -> Result<()> {
        self.check_open()?;
        if let Some(data) = self.storage.maps.write().remove(map.name()) {
            data.removed.store(true, Ordering::Release);
            tracing::trace!(map = map.name(), "removed in-memory spatial map");
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Map handle returned by [`MemSpatialStore::open_map`].
#[derive(Debug)]
pub struct MemSpatialMap {
    name: String,
    data: Arc<MapData>,
    store_closed: Arc<AtomicBool>,
}

impl MemSpatialMap {
    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SpatialError::closed(format!(
                "spatial map {} is closed",
                self.name
            )));
        }
        Ok(())
    }
}

impl SpatialMap for MemSpatialMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&self, key: SpatialKey) -> Result<()> {
        self.check_open()?;
        self.data.entries.write().insert(key);
        Ok(())
    }

    fn remove(&self, key: &SpatialKey) -> Result<bool> {
        self.check_open()?;
        Ok(self.data.entries.write().remove(key))
    }

    fn iter_all(&self) -> Result<KeyIter> {
        self.check_open()?;
        let keys = self.data.entries.read().collect(|_| true);
        Ok(Box::new(keys.into_iter()))
    }

    fn iter_intersecting(&self, query: &SpatialKey) -> Result<KeyIter> {
        self.check_open()?;
        if query.is_null() {
            return Ok(Box::new(std::iter::empty()));
        }
        let keys = self.data.entries.read().collect(|k| k.intersects(query));
        Ok(Box::new(keys.into_iter()))
    }

    fn clear(&self) -> Result<()> {
        self.check_open()?;
        *self.data.entries.write() = Entries::default();
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.entries.read().size
    }

    fn is_closed(&self) -> bool {
        self.store_closed.load(Ordering::Acquire) || self.data.removed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;

    fn key(id: i64, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> SpatialKey {
        SpatialKey::new(id, Some(&Envelope::new(min_x, max_x, min_y, max_y)))
    }

    #[test]
    fn test_duplicates_are_counted() {
        let store = MemSpatialStore::ephemeral();
        let map = store.open_map("m").unwrap();
        let k = key(1, 0.0, 1.0, 0.0, 1.0);
        map.add(k).unwrap();
        map.add(k).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter_all().unwrap().count(), 2);
        assert!(map.remove(&k).unwrap());
        assert_eq!(map.len(), 1);
        assert!(map.remove(&k).unwrap());
        assert!(!map.remove(&k).unwrap());
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let store = MemSpatialStore::ephemeral();
        let map = store.open_map("m").unwrap();
        map.add(key(1, 0.0, 1.0, 0.0, 1.0)).unwrap();
        assert!(!map.remove(&key(2, 0.0, 1.0, 0.0, 1.0)).unwrap());
        assert!(!map.remove(&key(1, 0.0, 2.0, 0.0, 1.0)).unwrap());
        assert!(!map.remove(&SpatialKey::id_only(1)).unwrap());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_intersecting_scan() {
        let store = MemSpatialStore::ephemeral();
        let map = store.open_map("m").unwrap();
        map.add(key(1, 0.0, 1.0, 0.0, 1.0)).unwrap();
        map.add(key(2, 5.0, 6.0, 5.0, 6.0)).unwrap();
        map.add(SpatialKey::id_only(3)).unwrap();

        let hits: Vec<i64> = map
            .iter_intersecting(&key(0, 0.5, 5.0, 0.5, 5.0))
            .unwrap()
            .map(|k| k.row_id())
            .collect();
        assert_eq!(hits, vec![1, 2]);

        assert_eq!(
            map.iter_intersecting(&SpatialKey::id_only(0)).unwrap().count(),
            0
        );
        assert_eq!(map.iter_all().unwrap().count(), 3);
    }

    #[test]
    fn test_iterators_are_snapshots() {
        let store = MemSpatialStore::ephemeral();
        let map = store.open_map("m").unwrap();
        map.add(key(1, 0.0, 1.0, 0.0, 1.0)).unwrap();
        let iter = map.iter_all().unwrap();
        map.add(key(2, 0.0, 1.0, 0.0, 1.0)).unwrap();
        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn test_reopen_keeps_content() {
        let storage = MemStorage::new();
        let store = MemSpatialStore::open(Arc::clone(&storage));
        let map = store.open_map("RTREE_1").unwrap();
        map.add(key(1, 0.0, 1.0, 0.0, 1.0)).unwrap();
        store.close().unwrap();
        assert!(map.is_closed());
        assert!(matches!(map.add(key(2, 0.0, 0.0, 0.0, 0.0)), Err(SpatialError::Closed(_))));
        assert!(matches!(store.open_map("x"), Err(SpatialError::Closed(_))));

        let reopened = MemSpatialStore::open(storage);
        let map = reopened.open_map("RTREE_1").unwrap();
        assert_eq!(map.len(), 1);
        assert!(!map.is_closed());
    }

    #[test]
    fn test_remove_map_and_clear() {
        let store = MemSpatialStore::ephemeral();
        let map = store.open_map("RTREE_9").unwrap();
        map.add(key(1, 0.0, 1.0, 0.0, 1.0)).unwrap();
        map.clear().unwrap();
        assert!(map.is_empty());
        assert!(store.storage().contains_map("RTREE_9"));

        store.remove_map(map.as_ref()).unwrap();
        assert!(map.is_closed());
        assert!(store.storage().map_names().is_empty());
    }
}
