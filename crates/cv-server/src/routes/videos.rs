//! Video listing, detail, streaming and tagging route handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::Json;
use cv_core::config::Config;
use cv_core::Error;
use cv_db::models::Item;
use cv_db::queries::items::{self, ItemQuery, SortOrder};
use cv_db::queries::labels;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;
use crate::streaming;

/// Sort order accepted by the listing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortParam {
    #[default]
    EpochDesc,
    EpochAsc,
}

impl SortParam {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "epoch_desc" => Some(Self::EpochDesc),
            "epoch_asc" => Some(Self::EpochAsc),
            _ => None,
        }
    }
}

impl From<SortParam> for SortOrder {
    fn from(s: SortParam) -> Self {
        match s {
            SortParam::EpochDesc => SortOrder::EpochDesc,
            SortParam::EpochAsc => SortOrder::EpochAsc,
        }
    }
}

/// Query parameters for listing videos. `tags` may be repeated.
#[derive(Debug, Clone, PartialEq, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListVideosParams {
    /// 1-based page number.
    pub page: u32,
    /// Defaults to the configured page size.
    pub page_size: Option<u32>,
    pub sort: SortParam,
    /// Only videos carrying every one of these tags.
    pub tags: Vec<String>,
    pub available_only: bool,
}

impl Default for ListVideosParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
            sort: SortParam::EpochDesc,
            tags: Vec::new(),
            available_only: true,
        }
    }
}

impl ListVideosParams {
    /// Build from raw query pairs, keeping every `tags` occurrence.
    pub fn from_pairs(pairs: &[(String, String)]) -> cv_core::Result<Self> {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => params.page = parse_number(key, value)?,
                "page_size" => params.page_size = Some(parse_number(key, value)?),
                "sort" => {
                    params.sort = SortParam::parse(value).ok_or_else(|| {
                        Error::Validation(format!(
                            "sort must be 'epoch_desc' or 'epoch_asc', got '{value}'"
                        ))
                    })?
                }
                "tags" => {
                    let tag = value.trim();
                    if !tag.is_empty() {
                        params.tags.push(tag.to_string());
                    }
                }
                "available_only" => params.available_only = parse_bool(key, value)?,
                _ => {}
            }
        }
        Ok(params)
    }

    /// Validate against the configured limits and turn into a store query.
    pub fn to_item_query(&self, config: &Config) -> cv_core::Result<ItemQuery> {
        if self.page < 1 {
            return Err(Error::Validation("page must be at least 1".into()));
        }
        let max = config.api.max_page_size.max(1);
        let page_size = self.page_size.unwrap_or_else(|| config.effective_page_size());
        if !(1..=max).contains(&page_size) {
            return Err(Error::Validation(format!(
                "page_size must be between 1 and {max}"
            )));
        }
        Ok(ItemQuery {
            page: self.page,
            page_size,
            sort: self.sort.into(),
            labels: self.tags.clone(),
            available_only: self.available_only,
        })
    }
}

fn parse_number(key: &str, value: &str) -> cv_core::Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("{key} must be a non-negative integer")))
}

fn parse_bool(key: &str, value: &str) -> cv_core::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Validation(format!("{key} must be a boolean"))),
    }
}

/// Video as shown in listings.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoSummary {
    pub id: String,
    pub folder_name: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub webpage_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub aspect_ratio: Option<f64>,
    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub extractor: Option<String>,
    pub post_timestamp: Option<i64>,
    pub epoch: Option<i64>,
    pub is_available: bool,
    pub tags: Vec<String>,
}

impl VideoSummary {
    fn from_model(item: &Item, tags: Vec<String>) -> Self {
        Self {
            id: item.id.clone(),
            folder_name: item.folder_name.clone(),
            title: item.title.clone(),
            uploader: item.uploader.clone(),
            uploader_url: item.uploader_url.clone(),
            webpage_url: item.webpage_url.clone(),
            thumbnail: item.thumbnail.clone(),
            duration: item.duration,
            width: item.width,
            height: item.height,
            aspect_ratio: item.aspect_ratio,
            like_count: item.like_count,
            repost_count: item.repost_count,
            comment_count: item.comment_count,
            extractor: item.extractor.clone(),
            post_timestamp: item.post_timestamp,
            epoch: item.epoch,
            is_available: item.is_available,
            tags,
        }
    }
}

/// Full video record.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub summary: VideoSummary,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoListResponse {
    pub items: Vec<VideoSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddTagRequest {
    pub name: String,
}

/// Tag names currently on a video.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoTagsResponse {
    pub tags: Vec<String>,
}

fn tag_names(conn: &Connection, item_id: &str) -> cv_core::Result<Vec<String>> {
    Ok(labels::labels_for_item(conn, item_id)?
        .into_iter()
        .map(|l| l.name)
        .collect())
}

fn require_item(conn: &Connection, id: &str) -> cv_core::Result<Item> {
    items::get_item(conn, id)?.ok_or_else(|| Error::not_found("video", id))
}

/// GET /api/videos
#[utoipa::path(
    get,
    path = "/api/videos",
    params(ListVideosParams),
    responses(
        (status = 200, description = "One page of videos", body = VideoListResponse),
        (status = 400, description = "Invalid paging or sort parameters")
    )
)]
pub async fn list_videos(
    State(ctx): State<AppContext>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<VideoListResponse>, AppError> {
    let params = ListVideosParams::from_pairs(&pairs)?;
    let query = params.to_item_query(&ctx.config)?;

    let conn = cv_db::pool::get_conn(&ctx.db)?;
    let page = items::list_items(&conn, &query)?;

    let summaries = page
        .items
        .iter()
        .map(|item| -> cv_core::Result<VideoSummary> {
            Ok(VideoSummary::from_model(item, tag_names(&conn, &item.id)?))
        })
        .collect::<cv_core::Result<Vec<_>>>()?;

    Ok(Json(VideoListResponse {
        items: summaries,
        total: page.total,
        page: query.page,
        page_size: query.page_size,
        has_next: i64::from(query.page) * i64::from(query.page_size) < page.total,
    }))
}

/// GET /api/videos/{id}
#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video details", body = VideoDetail),
        (status = 404, description = "Video not found")
    )
)]
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoDetail>, AppError> {
    let conn = cv_db::pool::get_conn(&ctx.db)?;
    let item = require_item(&conn, &id)?;
    let tags = tag_names(&conn, &item.id)?;

    Ok(Json(VideoDetail {
        description: item.description.clone(),
        summary: VideoSummary::from_model(&item, tags),
    }))
}

/// GET /api/videos/{id}/stream
#[utoipa::path(
    get,
    path = "/api/videos/{id}/stream",
    params(("id" = String, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Whole file"),
        (status = 206, description = "Requested byte range"),
        (status = 404, description = "Video or file not found")
    )
)]
pub async fn stream_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let path = streaming::locate_media(&ctx, id).await?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    Ok(streaming::serve_file(&path, range).await?)
}

/// POST /api/videos/{id}/tags
#[utoipa::path(
    post,
    path = "/api/videos/{id}/tags",
    params(("id" = String, Path, description = "Video ID")),
    request_body = AddTagRequest,
    responses(
        (status = 200, description = "Tags after the change", body = VideoTagsResponse),
        (status = 400, description = "Blank tag name"),
        (status = 404, description = "Video not found")
    )
)]
pub async fn add_tag(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<AddTagRequest>,
) -> Result<Json<VideoTagsResponse>, AppError> {
    let conn = cv_db::pool::get_conn(&ctx.db)?;
    let item = require_item(&conn, &id)?;

    let label = labels::get_or_create_label(&conn, &req.name)?;
    labels::attach_label(&conn, &item.id, label.id)?;
    tracing::debug!(video = %item.id, tag = %label.name, "Tag added");

    Ok(Json(VideoTagsResponse {
        tags: tag_names(&conn, &item.id)?,
    }))
}

/// DELETE /api/videos/{id}/tags/{tag_id}
#[utoipa::path(
    delete,
    path = "/api/videos/{id}/tags/{tag_id}",
    params(
        ("id" = String, Path, description = "Video ID"),
        ("tag_id" = i64, Path, description = "Tag ID")
    ),
    responses(
        (status = 200, description = "Tags after the change", body = VideoTagsResponse),
        (status = 404, description = "Video not found")
    )
)]
pub async fn remove_tag(
    State(ctx): State<AppContext>,
    Path((id, tag_id)): Path<(String, i64)>,
) -> Result<Json<VideoTagsResponse>, AppError> {
    let conn = cv_db::pool::get_conn(&ctx.db)?;
    let item = require_item(&conn, &id)?;

    if labels::detach_label(&conn, &item.id, tag_id)? {
        tracing::debug!(video = %item.id, tag_id, "Tag removed");
    }

    Ok(Json(VideoTagsResponse {
        tags: tag_names(&conn, &item.id)?,
    }))
}
