// Core directory exports
pub mod dispatcher;
pub mod distance;
pub mod filters;
pub mod index;
pub mod query;
pub mod registry;
pub mod store;

pub use dispatcher::{ChannelUnavailable, DeliveryFailure, DispatchReport, NotificationDispatcher};
pub use distance::{calculate_bounding_box, haversine_distance, region_around};
pub use filters::{matches_region_and_tags, normalize_tags, parse_tag_list};
pub use index::SpatialIndex;
pub use query::QueryEngine;
pub use registry::{PushReceiver, SubscriptionInfo, SubscriptionRegistry};
pub use store::{PutOutcome, RecordStore, StoreStats};
