//! Live subscription endpoints.
//!
//! Pushes are delivered as Server-Sent Events on a long-lived response:
//! - `subscribed`: first frame, carries the subscription id
//! - `record`: a newly registered or updated record matching the subscription
//! - `retired`: the subscription was replaced by a newer stream for the client
//! - `closed`: the subscription was removed (unsubscribe, idle reaping, shutdown)
//!
//! Opening a new stream for a client atomically replaces its previous
//! subscription. Dropping the connection unsubscribes.

use actix_web::http::header::{self, ContentEncoding};
use actix_web::{web, HttpResponse};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use validator::Validate;

use crate::models::{PushEvent, RegionParams, RemovedResponse, SubscriptionId, SubscriptionResponse};
use crate::routes::{ApiError, AppState};
use crate::services::Directory;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/subscriptions/{client_id}/stream", web::get().to(open_stream))
        .route("/subscriptions/{client_id}", web::put().to(update_subscription))
        .route("/subscriptions/{client_id}", web::delete().to(unsubscribe));
}

/// Unsubscribes when the response stream is dropped (client went away)
struct StreamGuard {
    directory: Arc<Directory>,
    client_id: String,
    subscription_id: SubscriptionId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.directory
            .unsubscribe_if(&self.client_id, self.subscription_id);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribedFrame<'a> {
    client_id: &'a str,
    subscription_id: SubscriptionId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetiredFrame {
    replaced_by: SubscriptionId,
}

/// Format one Server-Sent Events frame
fn sse_frame<T: Serialize>(event: &str, data: &T) -> web::Bytes {
    let payload = serde_json::to_string(data).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize {} event: {}", event, e);
        "null".to_string()
    });
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event, payload))
}

pub(crate) fn push_frame(event: &PushEvent) -> web::Bytes {
    match event {
        PushEvent::Record(record) => sse_frame(event.event_name(), &**record),
        PushEvent::Retired { replaced_by } => sse_frame(
            event.event_name(),
            &RetiredFrame { replaced_by: *replaced_by },
        ),
        PushEvent::Closed => sse_frame(event.event_name(), &serde_json::json!({})),
    }
}

/// Open (or replace) the client's live subscription
///
/// GET /api/v1/subscriptions/{clientId}/stream?<region params>&tags=a,b
async fn open_stream(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RegionParams>,
) -> Result<HttpResponse, ApiError> {
    query.validate()?;

    let client_id = path.into_inner();
    let settings = &state.search;
    let region = query
        .region(settings.default_radius_km, settings.max_radius_km)?
        .bounding_box()?;
    let filter = query.tag_filter();

    let receiver = state.directory.subscribe(&client_id, region, filter)?;
    let subscription_id = receiver.id();

    tracing::info!(
        "Client {} subscribed ({}) to {:?}",
        client_id,
        subscription_id,
        region
    );

    let hello = sse_frame(
        "subscribed",
        &SubscribedFrame { client_id: &client_id, subscription_id },
    );

    let guard = StreamGuard {
        directory: Arc::clone(&state.directory),
        client_id,
        subscription_id,
    };

    let pushes = ReceiverStream::new(receiver.into_inner()).map(move |event| {
        let _keep_alive = &guard;
        Ok::<_, Infallible>(push_frame(&event))
    });
    let body = stream::once(async move { Ok::<_, Infallible>(hello) }).chain(pushes);

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(ContentEncoding::Identity)
        .streaming(body))
}

/// Move the client's live subscription to a new region/filter
///
/// PUT /api/v1/subscriptions/{clientId}
///
/// The existing stream keeps delivering; records registered after this call
/// returns are matched against the new region only.
async fn update_subscription(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<RegionParams>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let client_id = path.into_inner();
    let settings = &state.search;
    let region = req
        .region(settings.default_radius_km, settings.max_radius_km)?
        .bounding_box()?;
    let filter = req.tag_filter();

    let subscription_id = state
        .directory
        .retarget(&client_id, region, filter.clone())?;

    tracing::info!("Client {} moved subscription to {:?}", client_id, region);

    Ok(HttpResponse::Ok().json(SubscriptionResponse {
        client_id,
        subscription_id: subscription_id.0,
        region,
        tags: filter.tags().iter().cloned().collect(),
    }))
}

/// DELETE /api/v1/subscriptions/{clientId}
async fn unsubscribe(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let removed = state.directory.unsubscribe(&path);
    HttpResponse::Ok().json(RemovedResponse { removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    #[test]
    fn test_record_frame_format() {
        let record = Arc::new(Record::new("y", 10.0, 10.0, ["shelter"]));
        let frame = push_frame(&PushEvent::Record(record));
        let text = std::str::from_utf8(&frame).unwrap();

        assert!(text.starts_with("event: record\ndata: {"));
        assert!(text.contains("\"id\":\"y\""));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_retired_frame_format() {
        let frame = push_frame(&PushEvent::Retired { replaced_by: SubscriptionId(7) });
        assert_eq!(&frame[..], b"event: retired\ndata: {\"replacedBy\":7}\n\n");
    }
}
