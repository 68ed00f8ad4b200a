//! devradar - proximity directory and live subscription service
//!
//! Stores geo-tagged records, answers region + tag queries through a grid and
//! inverted tag index, and pushes newly registered records to clients whose
//! live subscription covers them.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{haversine_distance, calculate_bounding_box, NotificationDispatcher, QueryEngine, RecordStore, SubscriptionRegistry};
pub use error::DirectoryError;
pub use models::{BoundingBox, PushEvent, Record, RecordMetadata, TagFilter};
pub use services::Directory;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);
        assert!(bbox.min_lat < 40.7128);
        assert!(Directory::new(0.05, 4).stats().records == 0);
    }
}
