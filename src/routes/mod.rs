// Route exports
pub mod records;
pub mod search;
pub mod subscriptions;
pub mod system;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use std::sync::Arc;
use thiserror::Error;

use crate::config::SearchSettings;
use crate::error::DirectoryError;
use crate::models::ErrorResponse;
use crate::services::Directory;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<Directory>,
    pub search: SearchSettings,
}

/// Errors surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{message}")]
    Payload { error: &'static str, message: String },
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Directory(e) => e.code(),
            ApiError::Validation(_) => "validation_failed",
            ApiError::Payload { error, .. } => *error,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Directory(DirectoryError::NotFound(_))
            | ApiError::Directory(DirectoryError::NotSubscribed(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: self.status_code().as_u16(),
        })
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::Payload {
        error: "invalid_json",
        message: format!("Invalid JSON: {}", err),
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    ApiError::Payload {
        error: "invalid_query",
        message: format!("Invalid query: {}", err),
    }
    .into()
}

/// Extractor configuration returning JSON error bodies
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
        .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error));
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(system::configure)
            .configure(search::configure)
            .configure(records::configure)
            .configure(subscriptions::configure),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let not_found = ApiError::from(DirectoryError::NotFound("x".into()));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let bad_region = ApiError::from(DirectoryError::InvalidRegion("x".into()));
        assert_eq!(bad_region.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad_region.code(), "invalid_region");
    }
}
