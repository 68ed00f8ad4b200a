use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::models::{RecordHit, RegionParams, RegionSpec, SearchResponse};
use crate::routes::{ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/search", web::get().to(search));
}

/// Search the directory
///
/// GET /api/v1/search?minLat=..&maxLat=..&minLon=..&maxLon=..&tags=a,b
/// GET /api/v1/search?latitude=..&longitude=..&radiusKm=..&techs=a,b&limit=..
///
/// Bounds searches return every match in no particular order unless `limit`
/// is given. Center searches return the nearest records first, each with
/// `distanceKm`, capped at the configured default limit.
async fn search(
    state: web::Data<AppState>,
    query: web::Query<RegionParams>,
) -> Result<HttpResponse, ApiError> {
    query.validate()?;

    let settings = &state.search;
    let spec = query.region(settings.default_radius_km, settings.max_radius_km)?;
    let filter = query.tag_filter();
    let limit = query.limit.map(|limit| limit.clamp(1, settings.max_limit));

    let region = spec.bounding_box()?;
    let records: Vec<RecordHit> = match spec {
        RegionSpec::Bounds(bbox) => state
            .directory
            .search(&bbox, &filter)?
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|record| RecordHit {
                record: (*record).clone(),
                distance_km: None,
            })
            .collect(),
        RegionSpec::Around { latitude, longitude, radius_km } => state
            .directory
            .search_near(
                latitude,
                longitude,
                radius_km,
                &filter,
                limit.unwrap_or(settings.default_limit),
            )?,
    };

    tracing::info!(
        "Search returned {} records (tags: {:?})",
        records.len(),
        filter.tags()
    );

    Ok(HttpResponse::Ok().json(SearchResponse {
        total: records.len(),
        records,
        region,
    }))
}
