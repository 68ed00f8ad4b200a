use std::sync::Arc;

use crate::core::distance::{haversine_distance, region_around};
use crate::core::store::RecordStore;
use crate::error::Result;
use crate::models::{BoundingBox, Record, RecordHit, TagFilter};

/// One-shot search over the record store
///
/// Every search reads a single consistent snapshot of the store and index.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<RecordStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// All records inside `region` whose tags intersect `filter`
    ///
    /// An empty filter matches every record in the region. Result order is
    /// unspecified.
    pub fn search(&self, region: &BoundingBox, filter: &TagFilter) -> Result<Vec<Arc<Record>>> {
        region.validate()?;
        let records = self.store.query(region, filter);

        tracing::debug!(
            "Search {:?} tags={:?} returned {} records",
            region,
            filter.tags(),
            records.len()
        );

        Ok(records)
    }

    /// Records within `radius_km` of a center point, nearest first
    ///
    /// Searches the bounding box of the circle, then drops the corners by
    /// great-circle distance.
    pub fn search_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        filter: &TagFilter,
        limit: usize,
    ) -> Result<Vec<RecordHit>> {
        let region = region_around(latitude, longitude, radius_km)?;

        let mut hits: Vec<RecordHit> = self
            .search(&region, filter)?
            .into_iter()
            .filter_map(|record| {
                let distance_km =
                    haversine_distance(latitude, longitude, record.latitude, record.longitude);
                (distance_km <= radius_km).then(|| RecordHit {
                    record: (*record).clone(),
                    distance_km: Some(distance_km),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(limit);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(records: Vec<Record>) -> QueryEngine {
        let store = Arc::new(RecordStore::default());
        for record in records {
            store.put(record).unwrap();
        }
        QueryEngine::new(store)
    }

    #[test]
    fn test_search_rejects_degenerate_region() {
        let engine = engine_with(vec![]);
        let region = BoundingBox { min_lat: 10.0, max_lat: 10.0, min_lon: 9.0, max_lon: 11.0 };
        let err = engine.search(&region, &TagFilter::any()).unwrap_err();
        assert_eq!(err.code(), "invalid_region");
    }

    #[test]
    fn test_search_near_sorted_and_limited() {
        let engine = engine_with(vec![
            Record::new("far", 40.80, -74.0060, ["clinic"]),
            Record::new("near", 40.7130, -74.0060, ["clinic"]),
            Record::new("mid", 40.75, -74.0060, ["clinic"]),
            Record::new("outside", 41.5, -74.0060, ["clinic"]),
        ]);

        let hits = engine
            .search_near(40.7128, -74.0060, 20.0, &TagFilter::any(), 10)
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);

        let hits = engine
            .search_near(40.7128, -74.0060, 20.0, &TagFilter::any(), 1)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "near");
    }

    #[test]
    fn test_search_near_drops_box_corners() {
        // Inside the 10km bounding box but ~12km away diagonally
        let engine = engine_with(vec![Record::new("corner", 40.7928, -73.9000, ["clinic"])]);
        let hits = engine
            .search_near(40.7128, -74.0060, 10.0, &TagFilter::any(), 10)
            .unwrap();
        assert!(hits.is_empty());
    }
}
