//! REST API server module
//!
//! Optional HTTP surface of the poller: remote health, statistics, a manual
//! poll trigger, a live event stream and the OpenAPI document.

use crate::{Result, SftpPoller};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /health` - Remote health (200 UP, 503 DOWN); absent when `health.enabled` is false
/// - `GET /stats` - Cumulative poller statistics
/// - `POST /poll` - Run a tick now (409 when a tick is already running)
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(poller: SftpPoller) -> Router {
    let state = AppState::new(poller);
    let config = state.config.clone();

    let router = Router::new()
        .route("/stats", get(routes::get_stats))
        .route("/poll", post(routes::trigger_poll))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let router = if config.health.enabled {
        router.route("/health", get(routes::health_check))
    } else {
        router
    };

    // SwaggerUi registers its own document route; it must not collide with /openapi.json
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    router.with_state(state).layer(TraceLayer::new_for_http())
}

/// Start the API server on the configured bind address.
///
/// Serves until the poller shuts down, then drains open connections and
/// returns.
pub async fn start_api_server(poller: SftpPoller) -> Result<()> {
    let bind_address = poller.config().api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve_api(listener, poller).await
}

/// Serve the API on an already bound listener until the poller shuts down.
///
/// Open `/events` streams end when shutdown begins, so draining never waits
/// on a connected client.
pub async fn serve_api(listener: TcpListener, poller: SftpPoller) -> Result<()> {
    let stop = poller.state.cancel_token.clone();

    if let Ok(address) = listener.local_addr() {
        tracing::info!(address = %address, "API server listening");
    }

    axum::serve(listener, create_router(poller))
        .with_graceful_shutdown(stop.cancelled_owned())
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
