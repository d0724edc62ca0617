//! Axum router construction.
//!
//! Builds the full application router with the API routes, middleware
//! layers, the OpenAPI document and static file serving.

use std::path::PathBuf;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::videos::list_videos,
        routes::videos::get_video,
        routes::videos::stream_video,
        routes::videos::add_tag,
        routes::videos::remove_tag,
        routes::tags::list_tags,
        routes::admin::rescan,
        routes::admin::status,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::videos::SortParam,
        routes::videos::VideoSummary,
        routes::videos::VideoDetail,
        routes::videos::VideoListResponse,
        routes::videos::AddTagRequest,
        routes::videos::VideoTagsResponse,
        routes::tags::TagResponse,
        routes::admin::StatusResponse,
        crate::scanner::ScanSummary,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Videos
        .route("/videos", get(routes::videos::list_videos))
        .route("/videos/{id}", get(routes::videos::get_video))
        .route("/videos/{id}/stream", get(routes::videos::stream_video))
        .route("/videos/{id}/tags", post(routes::videos::add_tag))
        .route(
            "/videos/{id}/tags/{tag_id}",
            delete(routes::videos::remove_tag),
        )
        // Tags
        .route("/tags", get(routes::tags::list_tags))
        // Admin
        .route("/admin/rescan", post(routes::admin::rescan))
        .route("/admin/status", get(routes::admin::status));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for the frontend build.
    if let Some(dir) = static_dir {
        if dir.is_dir() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .fallback(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::debug!("Static directory {:?} not found; frontend disabled", dir);
        }
    }

    app
}
