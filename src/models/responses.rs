use serde::{Deserialize, Serialize};

use crate::models::domain::{BoundingBox, RecordHit};

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub records: Vec<RecordHit>,
    pub total: usize,
    pub region: BoundingBox,
}

/// Response for a record registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRecordResponse {
    pub id: String,
    /// False when an existing record was replaced
    pub created: bool,
    pub delivered: usize,
    pub dropped: usize,
}

/// Response for removals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// Response for a subscription retarget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub client_id: String,
    pub subscription_id: u64,
    pub region: BoundingBox,
    pub tags: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Service counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub records: usize,
    pub occupied_cells: usize,
    pub distinct_tags: usize,
    pub subscriptions: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
