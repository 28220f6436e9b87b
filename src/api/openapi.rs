//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the sftp-poller REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the sftp-poller REST API
///
/// The document is served at:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "sftp-poller REST API",
        version = "0.1.0",
        description = "Health, statistics, manual polling and live events for an SFTP directory poller",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8089", description = "Local development server")
    ),
    paths(
        // Poller
        crate::api::routes::get_stats,
        crate::api::routes::trigger_poll,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::RemoteEntry,
        crate::types::TransferResult,
        crate::types::TickReport,
        crate::types::PollerStats,
        crate::types::HealthStatus,
        crate::types::HealthReport,
        crate::types::Event,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "poller", description = "Poller - Statistics and manual poll trigger"),
        (name = "system", description = "System endpoints - Health, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
