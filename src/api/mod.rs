//! REST API layer: route handlers, DTOs, OpenAPI and router composition.
//!
//! Record endpoints are mounted under `/api/v1`; `/health` and the OpenAPI
//! document live at the root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Path the OpenAPI document is served from.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .merge(docs_router())
}

/// Builds the served application: REST, OpenAPI, `/ws`, and the
/// tracing, CORS and request-timeout layers.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(request_timeout);

    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(timeout),
        )
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    Router::new().merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, openapi::ApiDoc::openapi()))
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    use axum::Json;
    use utoipa::OpenApi;

    Router::new().route(
        OPENAPI_PATH,
        get(|| async { Json(openapi::ApiDoc::openapi()) }),
    )
}
