//! Tag autocomplete route handler.

use axum::extract::{Query, State};
use axum::Json;
use cv_db::models::LabelUsage;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;

/// Upper bound for `limit`.
const MAX_LIMIT: i64 = 200;

/// Query parameters for tag search.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTagsParams {
    /// Case-insensitive name prefix.
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Tag with the number of videos carrying it.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub video_count: i64,
}

impl From<LabelUsage> for TagResponse {
    fn from(l: LabelUsage) -> Self {
        Self {
            id: l.id,
            name: l.name,
            video_count: l.item_count,
        }
    }
}

/// GET /api/tags
#[utoipa::path(
    get,
    path = "/api/tags",
    params(ListTagsParams),
    responses(
        (status = 200, description = "Matching tags, most used first", body = Vec<TagResponse>),
        (status = 400, description = "limit out of range")
    )
)]
pub async fn list_tags(
    State(ctx): State<AppContext>,
    Query(params): Query<ListTagsParams>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    if !(1..=MAX_LIMIT).contains(&params.limit) {
        return Err(cv_core::Error::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))
        .into());
    }

    let conn = cv_db::pool::get_conn(&ctx.db)?;
    let tags = cv_db::queries::labels::search_labels(&conn, params.q.as_deref(), params.limit)?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}
