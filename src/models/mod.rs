// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{validate_coordinate, BoundingBox, PushEvent, Record, RecordHit, RecordMetadata, SubscriptionId, TagFilter};
pub use requests::{RegionParams, RegionSpec, RegisterRecordRequest, TagInput};
pub use responses::{ErrorResponse, HealthResponse, RegisterRecordResponse, RemovedResponse, SearchResponse, StatsResponse, SubscriptionResponse};
