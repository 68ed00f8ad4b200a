use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::filters::{matches_region_and_tags, normalize_tags};
use crate::core::index::SpatialIndex;
use crate::error::Result;
use crate::models::{BoundingBox, Record, TagFilter};

/// Outcome of a successful `put`
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// The committed record, shared with the dispatcher
    pub current: Arc<Record>,
    /// The record previously stored under the same id, if any
    pub previous: Option<Arc<Record>>,
}

/// Record store counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub records: usize,
    pub occupied_cells: usize,
    pub distinct_tags: usize,
}

struct StoreInner {
    records: HashMap<String, Arc<Record>>,
    index: SpatialIndex,
}

/// In-memory record store with its spatial-attribute index
///
/// Records and index share one lock: every mutation updates both before the
/// write guard is released, so readers never observe a partial update.
pub struct RecordStore {
    inner: RwLock<StoreInner>,
}

impl RecordStore {
    pub fn new(cell_size_deg: f64) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                records: HashMap::new(),
                index: SpatialIndex::new(cell_size_deg),
            }),
        }
    }

    /// Insert or replace a record by id
    ///
    /// Tags are normalised before the record is stored. Fails with
    /// `InvalidRecord` without touching the store if the id or coordinate is
    /// invalid.
    pub fn put(&self, mut record: Record) -> Result<PutOutcome> {
        record.tags = normalize_tags(std::mem::take(&mut record.tags));
        record.validate()?;
        let current = Arc::new(record);

        let mut inner = self.inner.write();
        let previous = inner.records.insert(current.id.clone(), Arc::clone(&current));
        if let Some(ref prev) = previous {
            inner.index.remove(prev);
        }
        inner.index.insert(&current);

        Ok(PutOutcome { current, previous })
    }

    /// Remove a record, returning it if it existed
    pub fn take(&self, id: &str) -> Option<Arc<Record>> {
        let mut inner = self.inner.write();
        let removed = inner.records.remove(id)?;
        inner.index.remove(&removed);
        Some(removed)
    }

    /// Remove a record; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Record>> {
        self.inner.read().records.get(id).cloned()
    }

    /// All records inside the region whose tags pass the filter
    ///
    /// Runs under a single read guard, so the result is a consistent snapshot.
    pub fn query(&self, region: &BoundingBox, filter: &TagFilter) -> Vec<Arc<Record>> {
        let inner = self.inner.read();
        inner
            .index
            .candidates(region, filter)
            .into_iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|record| matches_region_and_tags(record, region, filter))
            .cloned()
            .collect()
    }

    /// Remove every record registered before `cutoff`, returning their ids
    pub fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .records
            .values()
            .filter(|record| record.registered_at < cutoff)
            .map(|record| record.id.clone())
            .collect();

        for id in &expired {
            if let Some(record) = inner.records.remove(id) {
                inner.index.remove(&record);
            }
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            records: inner.records.len(),
            occupied_cells: inner.index.occupied_cells(),
            distinct_tags: inner.index.tag_count(),
        }
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(crate::core::index::DEFAULT_CELL_SIZE_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn region(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> BoundingBox {
        BoundingBox::new(min_lat, max_lat, min_lon, max_lon).unwrap()
    }

    #[test]
    fn test_put_returns_previous() {
        let store = RecordStore::default();
        let first = store.put(Record::new("a", 10.0, 10.0, ["clinic"])).unwrap();
        assert!(first.previous.is_none());

        let second = store.put(Record::new("a", 11.0, 11.0, ["shelter"])).unwrap();
        let previous = second.previous.unwrap();
        assert_eq!(previous.latitude, 10.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_put_has_no_effect() {
        let store = RecordStore::default();
        store.put(Record::new("a", 10.0, 10.0, ["clinic"])).unwrap();

        let err = store.put(Record::new("a", 200.0, 10.0, ["clinic"])).unwrap_err();
        assert_eq!(err.code(), "invalid_record");
        assert_eq!(store.get("a").unwrap().latitude, 10.0);
    }

    #[test]
    fn test_put_normalises_raw_tags() {
        let store = RecordStore::default();
        let record: Record = serde_json::from_value(serde_json::json!({
            "id": "a",
            "latitude": 10.0,
            "longitude": 10.0,
            "tags": ["Clinic", " SHELTER ", ""]
        }))
        .unwrap();
        store.put(record).unwrap();

        let hits = store.query(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::new(["clinic"]));
        assert_eq!(hits.len(), 1);
        assert!(hits[0].tags.contains("shelter"));
        assert_eq!(hits[0].tags.len(), 2);
    }

    #[test]
    fn test_moved_record_leaves_old_cell() {
        let store = RecordStore::default();
        store.put(Record::new("a", 10.0, 10.0, ["clinic"])).unwrap();
        store.put(Record::new("a", 40.0, 40.0, ["clinic"])).unwrap();

        assert!(store.query(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::any()).is_empty());
        assert_eq!(store.query(&region(39.0, 41.0, 39.0, 41.0), &TagFilter::any()).len(), 1);
    }

    #[test]
    fn test_retagged_record_leaves_old_posting() {
        let store = RecordStore::default();
        store.put(Record::new("a", 10.0, 10.0, ["clinic"])).unwrap();
        store.put(Record::new("a", 10.0, 10.0, ["shelter"])).unwrap();

        let area = region(9.0, 11.0, 9.0, 11.0);
        assert!(store.query(&area, &TagFilter::new(["clinic"])).is_empty());
        assert_eq!(store.query(&area, &TagFilter::new(["shelter"])).len(), 1);
        assert_eq!(store.stats().distinct_tags, 1);
    }

    #[test]
    fn test_remove() {
        let store = RecordStore::default();
        store.put(Record::new("a", 10.0, 10.0, ["clinic"])).unwrap();
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.get("a").is_none());
        assert_eq!(store.stats().occupied_cells, 0);
    }

    #[test]
    fn test_remove_expired() {
        let store = RecordStore::default();
        let mut old = Record::new("old", 10.0, 10.0, ["clinic"]);
        old.registered_at = Utc::now() - Duration::hours(2);
        store.put(old).unwrap();
        store.put(Record::new("fresh", 10.0, 10.0, ["clinic"])).unwrap();

        let removed = store.remove_expired(Utc::now() - Duration::hours(1));
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(store.get("fresh").is_some());
        assert_eq!(store.len(), 1);
    }
}
