//! System handlers: health, OpenAPI, events.

use crate::api::AppState;
use crate::types::Event;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// GET /health - Remote health
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Remote path reachable", body = crate::types::HealthReport),
        (status = 503, description = "Remote path missing or server unreachable", body = crate::types::HealthReport),
        (status = 404, description = "Health probe disabled")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.poller.health().await {
        Some(report) => {
            let status = if report.is_up() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(report)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::TickStarted { .. } => "tick_started",
        Event::TickSkipped { .. } => "tick_skipped",
        Event::TickFinished { .. } => "tick_finished",
        Event::ListFailed { .. } => "list_failed",
        Event::FileLanded { .. } => "file_landed",
        Event::TransferFailed { .. } => "transfer_failed",
        Event::RemoteDeleted { .. } => "remote_deleted",
        Event::RemoteDeleteFailed { .. } => "remote_delete_failed",
        Event::Processed { .. } => "processed",
        Event::ProcessorFailed { .. } => "processor_failed",
        Event::Shutdown => "shutdown",
    }
}

/// GET /events - Server-sent events stream
///
/// The stream closes when the poller starts shutting down.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.poller.subscribe();
    let stop = state.poller.state.cancel_token.clone().cancelled_owned();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event_name(&event))
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{}}}"#,
                skipped
            ))))
        }
    });

    let sse_stream = futures::StreamExt::take_until(sse_stream, stop);
    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
