// Unit tests for devradar

use devradar::core::{
    distance::{calculate_bounding_box, haversine_distance, region_around},
    filters::{matches_region_and_tags, parse_tag_list},
    RecordStore, SpatialIndex,
};
use devradar::models::{BoundingBox, Record, TagFilter};

fn region(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> BoundingBox {
    BoundingBox::new(min_lat, max_lat, min_lon, max_lon).unwrap()
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(40.7128, -74.0060, 40.7128, -74.0060);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_recife_to_jaboatao() {
    // Recife to Jaboatão dos Guararapes is roughly 15-20 km
    let distance = haversine_distance(-8.0476, -34.8770, -8.1803, -35.0014);
    assert!(distance > 10.0 && distance < 25.0);
}

#[test]
fn test_bounding_box_creation() {
    let bbox = calculate_bounding_box(-8.11, -34.97, 10.0);
    assert!(bbox.contains(-8.11, -34.97));
    assert!(!bbox.contains(-8.11 + 0.2, -34.97));
    assert!(bbox.validate().is_ok());
}

#[test]
fn test_region_around_zero_radius_rejected() {
    let err = region_around(-8.11, -34.97, 0.0).unwrap_err();
    assert_eq!(err.code(), "invalid_region");
}

#[test]
fn test_tag_list_parsing_is_case_insensitive() {
    let filter = TagFilter::new(parse_tag_list("Clinic, SHELTER"));
    let record = Record::new("a", 10.0, 10.0, ["clinic"]);
    assert!(matches_region_and_tags(&record, &region(9.0, 11.0, 9.0, 11.0), &filter));
}

#[test]
fn test_index_candidates_cover_exact_matches() {
    let mut index = SpatialIndex::new(0.5);
    let records: Vec<Record> = (0..50)
        .map(|i| {
            let tag = if i % 2 == 0 { "clinic" } else { "shelter" };
            Record::new(format!("r{}", i), 9.0 + i as f64 * 0.05, 9.0 + i as f64 * 0.05, [tag])
        })
        .collect();
    for record in &records {
        index.insert(record);
    }

    let area = region(9.5, 10.5, 9.5, 10.5);
    let filter = TagFilter::new(["clinic"]);
    let candidates = index.candidates(&area, &filter);

    for record in records.iter().filter(|r| matches_region_and_tags(r, &area, &filter)) {
        assert!(candidates.contains(&record.id.as_str()), "missing {}", record.id);
    }
}

#[test]
fn test_search_includes_and_excludes() {
    let store = RecordStore::new(0.05);
    store.put(Record::new("inside-clinic", 10.0, 10.0, ["clinic"])).unwrap();
    store.put(Record::new("inside-shelter", 10.2, 9.8, ["shelter"])).unwrap();
    store.put(Record::new("inside-tagless", 10.1, 10.1, Vec::<String>::new())).unwrap();
    store.put(Record::new("outside-clinic", 12.0, 10.0, ["clinic"])).unwrap();

    let area = region(9.0, 11.0, 9.0, 11.0);

    let mut all: Vec<String> = store
        .query(&area, &TagFilter::any())
        .iter()
        .map(|r| r.id.clone())
        .collect();
    all.sort();
    assert_eq!(all, vec!["inside-clinic", "inside-shelter", "inside-tagless"]);

    let clinics = store.query(&area, &TagFilter::new(["clinic"]));
    assert_eq!(clinics.len(), 1);
    assert_eq!(clinics[0].id, "inside-clinic");
}

#[test]
fn test_put_same_record_twice_is_idempotent() {
    let store = RecordStore::new(0.05);
    let record = Record::new("x", 10.0, 10.0, ["clinic"]);
    store.put(record.clone()).unwrap();
    let before = store.query(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::any());

    store.put(record).unwrap();
    let after = store.query(&region(9.0, 11.0, 9.0, 11.0), &TagFilter::any());

    assert_eq!(before, after);
    assert_eq!(store.stats().occupied_cells, 1);
    assert_eq!(store.stats().distinct_tags, 1);
}
