use crate::error::{DirectoryError, Result};
use crate::models::{validate_coordinate, BoundingBox};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate length of one degree of latitude in kilometers
const KM_PER_DEGREE: f64 = 111.0;

/// Calculate the Haversine distance between two points in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Calculate the bounding box of a circle around a center point
///
/// 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude). The result is
/// clamped to the valid coordinate range, so a circle touching a pole or the
/// antimeridian is cut at the edge instead of wrapping. Records within the
/// radius on the far side of the antimeridian are not covered.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;

    // cos(lat) reaches zero at the poles; cover the full longitude range there
    let cos_lat = lat.to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-9 {
        360.0
    } else {
        radius_km / (KM_PER_DEGREE * cos_lat)
    };

    BoundingBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lon: (lon - lon_delta).max(-180.0),
        max_lon: (lon + lon_delta).min(180.0),
    }
}

/// Build a validated search region from a center point and radius
pub fn region_around(lat: f64, lon: f64, radius_km: f64) -> Result<BoundingBox> {
    validate_coordinate(lat, lon).map_err(DirectoryError::InvalidRegion)?;
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(DirectoryError::InvalidRegion(format!(
            "radius {} km must be positive",
            radius_km
        )));
    }
    let bbox = calculate_bounding_box(lat, lon, radius_km);
    bbox.validate()?;
    Ok(bbox)
}
