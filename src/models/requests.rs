use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::distance::region_around;
use crate::core::filters::parse_tag_list;
use crate::error::{DirectoryError, Result};
use crate::models::domain::{BoundingBox, Record, RecordMetadata, TagFilter};

/// Region and tag filter as sent by the client
///
/// Coordinates are checked when the region is resolved, so a bad value is
/// reported as `InvalidRegion` like any other unusable region.
///
/// Either explicit bounds (`minLat`, `maxLat`, `minLon`, `maxLon`) or a
/// center with an optional radius (`latitude`, `longitude`, `radiusKm`).
/// `tags` is a comma-separated list; `techs` is accepted as an alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegionParams {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    #[validate(length(max = 1024))]
    #[serde(default, alias = "techs")]
    pub tags: Option<String>,
    pub limit: Option<usize>,
}

/// How a request described its region
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionSpec {
    Bounds(BoundingBox),
    Around {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
}

impl RegionSpec {
    /// The bounding box searched or subscribed to
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        match *self {
            RegionSpec::Bounds(bbox) => Ok(bbox),
            RegionSpec::Around { latitude, longitude, radius_km } => {
                region_around(latitude, longitude, radius_km)
            }
        }
    }
}

impl RegionParams {
    /// Resolve the region, applying the default radius and capping it
    pub fn region(&self, default_radius_km: f64, max_radius_km: f64) -> Result<RegionSpec> {
        match (self.min_lat, self.max_lat, self.min_lon, self.max_lon) {
            (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => Ok(RegionSpec::Bounds(
                BoundingBox::new(min_lat, max_lat, min_lon, max_lon)?,
            )),
            (None, None, None, None) => match (self.latitude, self.longitude) {
                (Some(latitude), Some(longitude)) => {
                    let radius_km = match self.radius_km {
                        Some(radius_km) if !radius_km.is_finite() => {
                            return Err(DirectoryError::InvalidRegion(format!(
                                "radius {} km is not finite",
                                radius_km
                            )))
                        }
                        Some(radius_km) => radius_km.min(max_radius_km),
                        None => default_radius_km.min(max_radius_km),
                    };
                    // Validate eagerly so subscribe errors match search errors
                    region_around(latitude, longitude, radius_km)?;
                    Ok(RegionSpec::Around { latitude, longitude, radius_km })
                }
                _ => Err(DirectoryError::InvalidRegion(
                    "either minLat/maxLat/minLon/maxLon or latitude/longitude is required"
                        .to_string(),
                )),
            },
            _ => Err(DirectoryError::InvalidRegion(
                "minLat, maxLat, minLon and maxLon must be given together".to_string(),
            )),
        }
    }

    pub fn tag_filter(&self) -> TagFilter {
        match &self.tags {
            Some(raw) => TagFilter::new(parse_tag_list(raw)),
            None => TagFilter::any(),
        }
    }
}

/// Tags as a JSON list or a comma-separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Csv(String),
}

impl Default for TagInput {
    fn default() -> Self {
        TagInput::List(Vec::new())
    }
}

/// Request to register or re-register a record
///
/// The id and coordinate are checked by `Record::validate` on registration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRecordRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "techs")]
    pub tags: TagInput,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[validate(url)]
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, alias = "githubUsername")]
    pub username: Option<String>,
}

impl RegisterRecordRequest {
    /// Build the record, generating an id when none was supplied
    pub fn into_record(self) -> Record {
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let tags: Vec<String> = match self.tags {
            TagInput::List(tags) => tags,
            TagInput::Csv(raw) => parse_tag_list(&raw).into_iter().collect(),
        };

        Record::new(id, self.latitude, self.longitude, tags).with_metadata(RecordMetadata {
            name: self.name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            username: self.username,
        })
    }
}
