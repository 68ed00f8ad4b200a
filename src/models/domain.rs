use chrono::{DateTime, Utc};
use geo::{coord, Intersects, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::core::filters::normalize_tags;
use crate::error::{DirectoryError, Result};

/// Maximum length of a record identifier in bytes
pub const MAX_RECORD_ID_LEN: usize = 128;

/// Display metadata attached to a record
///
/// Opaque to the directory core: stored and returned unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A geo-tagged entity in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Normalised tag set (trimmed, lowercase). Empty means tag-less.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: RecordMetadata,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

impl Record {
    /// Build a record with normalised tags and empty metadata
    pub fn new<I, S>(id: impl Into<String>, latitude: f64, longitude: f64, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            latitude,
            longitude,
            tags: normalize_tags(tags),
            metadata: RecordMetadata::default(),
            registered_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_tagless(&self) -> bool {
        self.tags.is_empty()
    }

    /// Check the identifier and coordinate invariants
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DirectoryError::InvalidRecord("id must not be empty".to_string()));
        }
        if self.id.len() > MAX_RECORD_ID_LEN {
            return Err(DirectoryError::InvalidRecord(format!(
                "id longer than {} bytes",
                MAX_RECORD_ID_LEN
            )));
        }
        validate_coordinate(self.latitude, self.longitude)
            .map_err(DirectoryError::InvalidRecord)
    }
}

/// Returns a description of the problem if the coordinate is unusable
pub fn validate_coordinate(latitude: f64, longitude: f64) -> std::result::Result<(), String> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(format!("coordinate ({}, {}) is not finite", latitude, longitude));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {} outside [-90, 90]", latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {} outside [-180, 180]", longitude));
    }
    Ok(())
}

/// Geospatial bounding box
///
/// This is the region of interest for searches and subscriptions. Bounds are
/// inclusive. Boxes crossing the antimeridian are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a validated bounding box
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let bbox = Self { min_lat, max_lat, min_lon, max_lon };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Reject non-finite, out-of-range or degenerate boxes
    pub fn validate(&self) -> Result<()> {
        for (lat, lon) in [(self.min_lat, self.min_lon), (self.max_lat, self.max_lon)] {
            validate_coordinate(lat, lon).map_err(DirectoryError::InvalidRegion)?;
        }
        if self.min_lat >= self.max_lat {
            return Err(DirectoryError::InvalidRegion(format!(
                "minLat {} must be below maxLat {}",
                self.min_lat, self.max_lat
            )));
        }
        if self.min_lon >= self.max_lon {
            return Err(DirectoryError::InvalidRegion(format!(
                "minLon {} must be below maxLon {}",
                self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    fn as_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Check whether a point lies inside the box (edges included)
    #[inline]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.as_rect().intersects(&coord! { x: longitude, y: latitude })
    }
}

/// Tag filter of a query or subscription; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagFilter(BTreeSet<String>);

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(normalize_tags(tags))
    }

    /// Filter that matches every record
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.0
    }

    /// Empty filter matches all records, otherwise tags must intersect
    #[inline]
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| tags.contains(t))
    }
}

/// Identifier of one installed subscription; increases on every install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message delivered on a subscription channel
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// A newly registered or re-registered record matching the subscription
    Record(Arc<Record>),
    /// The subscription was replaced by a newer one; no further pushes follow
    Retired { replaced_by: SubscriptionId },
    /// The subscription was removed by an explicit unsubscribe or the reaper
    Closed,
}

impl PushEvent {
    /// Event name used on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::Record(_) => "record",
            PushEvent::Retired { .. } => "retired",
            PushEvent::Closed => "closed",
        }
    }
}

/// A search hit, optionally annotated with its distance from a search center
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHit {
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}
