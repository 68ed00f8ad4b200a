use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::models::{RegisterRecordRequest, RegisterRecordResponse, RemovedResponse};
use crate::routes::{ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/records", web::post().to(register_record))
        .route("/records/{id}", web::get().to(get_record))
        .route("/records/{id}", web::delete().to(remove_record));
}

/// Register or re-register a record
///
/// POST /api/v1/records
///
/// Request body:
/// ```json
/// {
///   "id": "optional",
///   "latitude": -8.11,
///   "longitude": -34.97,
///   "tags": ["clinic"] | "clinic, shelter",
///   "name": "string",
///   "bio": "string",
///   "avatarUrl": "string",
///   "username": "string"
/// }
/// ```
///
/// Matching live subscriptions receive the record as a push. Push failures
/// are counted in `dropped` and never fail the registration.
async fn register_record(
    state: web::Data<AppState>,
    req: web::Json<RegisterRecordRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for register request: {:?}", errors);
        return Err(errors.into());
    }

    let registration = state.directory.register(req.into_inner().into_record())?;

    let response = RegisterRecordResponse {
        id: registration.record.id.clone(),
        created: registration.created,
        delivered: registration.report.delivered.len(),
        dropped: registration.report.failures.len(),
    };

    if registration.created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

/// GET /api/v1/records/{id}
async fn get_record(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let record = state.directory.get(&path)?;
    Ok(HttpResponse::Ok().json(&*record))
}

/// Remove a record. Subscribers are not notified.
///
/// DELETE /api/v1/records/{id}
async fn remove_record(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let removed = state.directory.remove(&path);
    HttpResponse::Ok().json(RemovedResponse { removed })
}
