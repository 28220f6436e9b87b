//! Poller handlers: statistics and manual trigger.

use crate::api::AppState;
use crate::error::Error;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /stats - Cumulative poller statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "poller",
    responses(
        (status = 200, description = "Cumulative poller statistics", body = crate::types::PollerStats)
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.poller.stats())
}

/// POST /poll - Run a tick now
#[utoipa::path(
    post,
    path = "/poll",
    tag = "poller",
    responses(
        (status = 200, description = "Tick completed", body = crate::types::TickReport),
        (status = 409, description = "A tick is already running; nothing was done", body = crate::types::TickReport),
        (status = 503, description = "Poller is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn trigger_poll(State(state): State<AppState>) -> Response {
    if state.poller.is_shutting_down() {
        return Error::ShuttingDown.into_response();
    }

    let report = state.poller.tick().await;
    let status = if report.skipped {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}
