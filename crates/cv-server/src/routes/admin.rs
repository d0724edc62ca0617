//! Admin route handlers: on-demand rescan and catalog status.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::scanner::ScanSummary;

/// Catalog counters and the configured locations.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub total_videos: i64,
    pub available_videos: i64,
    pub total_tags: i64,
    pub video_dir: String,
    pub database_path: String,
}

/// POST /api/admin/rescan
#[utoipa::path(
    post,
    path = "/api/admin/rescan",
    responses(
        (status = 200, description = "Scan finished", body = ScanSummary),
        (status = 500, description = "Scan failed and was rolled back")
    )
)]
pub async fn rescan(State(ctx): State<AppContext>) -> Result<Json<ScanSummary>, AppError> {
    let summary = ctx.scanner.scan().await?;
    Ok(Json(summary))
}

/// GET /api/admin/status
#[utoipa::path(
    get,
    path = "/api/admin/status",
    responses(
        (status = 200, description = "Catalog status", body = StatusResponse)
    )
)]
pub async fn status(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, AppError> {
    let conn = cv_db::pool::get_conn(&ctx.db)?;

    Ok(Json(StatusResponse {
        total_videos: cv_db::queries::items::count_items(&conn)?,
        available_videos: cv_db::queries::items::count_available_items(&conn)?,
        total_tags: cv_db::queries::labels::count_labels(&conn)?,
        video_dir: ctx.scanner.settings().video_dir.display().to_string(),
        database_path: ctx.config.server.db_path.display().to_string(),
    }))
}
