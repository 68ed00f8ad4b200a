//! Spatial-attribute index over the record store.
//!
//! Two independent structures answer the two filter dimensions of a query:
//! - a uniform grid of square cells, keyed by `(row, col)` in an ordered map so
//!   a region scan only touches occupied cells inside its row/column range
//! - an inverted index from normalised tag to record ids
//!
//! The index only returns candidate ids. The store performs the exact
//! region/tag check on each candidate, which also covers partially overlapped
//! edge cells.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{BoundingBox, Record, TagFilter};

/// Default grid cell size in degrees (roughly 5.5 km of latitude)
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.05;

/// Grid cell coordinates (row from latitude, col from longitude)
pub type CellKey = (i32, i32);

#[derive(Debug)]
pub struct SpatialIndex {
    cell_size_deg: f64,
    cells: BTreeMap<CellKey, HashSet<String>>,
    tags: HashMap<String, HashSet<String>>,
}

impl SpatialIndex {
    pub fn new(cell_size_deg: f64) -> Self {
        let cell_size_deg = if cell_size_deg.is_finite() && cell_size_deg > 0.0 {
            cell_size_deg
        } else {
            tracing::warn!(
                "Invalid grid cell size {}, falling back to {}",
                cell_size_deg,
                DEFAULT_CELL_SIZE_DEG
            );
            DEFAULT_CELL_SIZE_DEG
        };

        Self {
            cell_size_deg,
            cells: BTreeMap::new(),
            tags: HashMap::new(),
        }
    }

    pub fn cell_size_deg(&self) -> f64 {
        self.cell_size_deg
    }

    #[inline]
    fn cell_of(&self, latitude: f64, longitude: f64) -> CellKey {
        (
            (latitude / self.cell_size_deg).floor() as i32,
            (longitude / self.cell_size_deg).floor() as i32,
        )
    }

    /// Add a record's id to its cell and to the posting list of each tag
    pub fn insert(&mut self, record: &Record) {
        let cell = self.cell_of(record.latitude, record.longitude);
        self.cells.entry(cell).or_default().insert(record.id.clone());

        for tag in &record.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(record.id.clone());
        }
    }

    /// Remove a record's id, pruning cells and postings that become empty
    ///
    /// `record` must be the exact version that was inserted.
    pub fn remove(&mut self, record: &Record) {
        let cell = self.cell_of(record.latitude, record.longitude);
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.remove(&record.id);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }

        for tag in &record.tags {
            if let Some(ids) = self.tags.get_mut(tag) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
    }

    /// Occupied cells intersecting the region, with their id sets
    fn cells_in<'a>(
        &'a self,
        region: &BoundingBox,
    ) -> Box<dyn Iterator<Item = &'a HashSet<String>> + 'a> {
        let (row_min, col_min) = self.cell_of(region.min_lat, region.min_lon);
        let (row_max, col_max) = self.cell_of(region.max_lat, region.max_lon);
        let row_span = (row_max as i64 - row_min as i64 + 1) as usize;

        if row_span > self.cells.len() {
            // Wide region over a sparse grid: walking the occupied cells is cheaper
            Box::new(
                self.cells
                    .range((row_min, i32::MIN)..=(row_max, i32::MAX))
                    .filter(move |((_, col), _)| *col >= col_min && *col <= col_max)
                    .map(|(_, ids)| ids),
            )
        } else {
            Box::new((row_min..=row_max).flat_map(move |row| {
                self.cells
                    .range((row, col_min)..=(row, col_max))
                    .map(|(_, ids)| ids)
            }))
        }
    }

    /// Candidate ids for a region and tag filter
    ///
    /// Returns a superset of the exact matches: every record inside the region
    /// that passes the filter is included.
    pub fn candidates(&self, region: &BoundingBox, filter: &TagFilter) -> Vec<&str> {
        if filter.is_empty() {
            return self
                .cells_in(region)
                .flat_map(|ids| ids.iter().map(String::as_str))
                .collect();
        }

        let postings: Vec<&HashSet<String>> = filter
            .tags()
            .iter()
            .filter_map(|tag| self.tags.get(tag))
            .collect();
        if postings.is_empty() {
            return Vec::new();
        }

        let tag_count: usize = postings.iter().map(|ids| ids.len()).sum();
        let spatial_count: usize = self.cells_in(region).map(|ids| ids.len()).sum();

        if tag_count <= spatial_count {
            let mut seen = HashSet::with_capacity(tag_count);
            postings
                .into_iter()
                .flat_map(|ids| ids.iter().map(String::as_str))
                .filter(|id| seen.insert(*id))
                .collect()
        } else {
            self.cells_in(region)
                .flat_map(|ids| ids.iter().map(String::as_str))
                .collect()
        }
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> BoundingBox {
        BoundingBox::new(min_lat, max_lat, min_lon, max_lon).unwrap()
    }

    #[test]
    fn test_insert_and_candidates() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(&Record::new("a", 10.0, 10.0, ["clinic"]));
        index.insert(&Record::new("b", 10.5, 10.5, ["shelter"]));
        index.insert(&Record::new("c", 40.0, 40.0, ["clinic"]));

        let mut ids = index.candidates(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::any());
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        // Tag filter never drops a true match
        let ids = index.candidates(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::new(["clinic"]));
        assert!(ids.contains(&"a"));
        assert!(!ids.contains(&"b"));
    }

    #[test]
    fn test_unknown_tag_has_no_candidates() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(&Record::new("a", 10.0, 10.0, ["clinic"]));
        let ids = index.candidates(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::new(["pharmacy"]));
        assert!(ids.is_empty());
    }

    #[test]
    fn test_remove_prunes_empty_structures() {
        let mut index = SpatialIndex::new(1.0);
        let record = Record::new("a", 10.0, 10.0, ["clinic", "shelter"]);
        index.insert(&record);
        assert_eq!(index.occupied_cells(), 1);
        assert_eq!(index.tag_count(), 2);

        index.remove(&record);
        assert_eq!(index.occupied_cells(), 0);
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn test_world_region_over_sparse_grid() {
        let mut index = SpatialIndex::new(0.01);
        index.insert(&Record::new("a", -33.9, 151.2, Vec::<String>::new()));
        index.insert(&Record::new("b", 51.5, -0.1, Vec::<String>::new()));

        let ids = index.candidates(&region(-90.0, 90.0, -180.0, 180.0), &TagFilter::any());
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_negative_coordinates_map_to_distinct_cells() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(&Record::new("sw", -0.5, -0.5, Vec::<String>::new()));
        index.insert(&Record::new("ne", 0.5, 0.5, Vec::<String>::new()));
        assert_eq!(index.occupied_cells(), 2);

        let ids = index.candidates(&region(-1.0, -0.1, -1.0, -0.1), &TagFilter::any());
        assert_eq!(ids, vec!["sw"]);
    }

    #[test]
    fn test_invalid_cell_size_falls_back() {
        assert_eq!(SpatialIndex::new(0.0).cell_size_deg(), DEFAULT_CELL_SIZE_DEG);
        assert_eq!(SpatialIndex::new(f64::NAN).cell_size_deg(), DEFAULT_CELL_SIZE_DEG);
    }
}
