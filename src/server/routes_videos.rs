//! Catalog metadata routes.
//!
//! Read-only views over the video catalog: single-video metadata, the id
//! listing, and filtered/paginated search.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vidserve_common::{Error, VideoId};
use vidserve_db::{
    models::{VideoListing, VideoMetadata},
    pool::get_conn,
    queries::videos::{self, Pagination, SearchParams, VideoQuery},
};

use super::error::AppError;
use super::AppContext;

/// Create metadata routes.
pub fn video_routes() -> Router<AppContext> {
    Router::new()
        .route("/video/:video_id", get(get_video))
        .route("/videos", get(list_videos))
        .route("/videos/search", get(search_videos))
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Public metadata of one video.
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: VideoId,
    pub title: String,
    pub creator: String,
    pub description: Option<String>,
    pub upload_date: DateTime<Utc>,
}

impl From<VideoMetadata> for VideoResponse {
    fn from(video: VideoMetadata) -> Self {
        Self {
            id: video.id,
            title: video.title,
            creator: video.creator,
            description: video.description,
            upload_date: video.upload_date,
        }
    }
}

/// Query parameters for `/videos/search`.
///
/// Paging values are taken as strings so that garbage falls back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl SearchQuery {
    fn params(&self) -> SearchParams {
        SearchParams {
            title: self.title.clone(),
            creator: self.creator.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            sort_by: self.sort_by.clone(),
            order: self.order.clone(),
        }
    }

    fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        let parse = |v: &Option<String>, default: u32| {
            v.as_deref()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };
        Pagination::new(
            parse(&self.page, defaults.page),
            parse(&self.per_page, defaults.per_page),
        )
    }
}

/// One page of search results.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub videos: Vec<VideoListing>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
    pub per_page: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// Run a blocking catalog operation off the async runtime.
async fn with_conn<T, F>(ctx: &AppContext, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> vidserve_common::Result<T> + Send + 'static,
{
    let pool = ctx.db_pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        f(&*conn)
    })
    .await
    .map_err(|e| Error::internal(format!("catalog task failed: {e}")))?
    .map_err(AppError::from)
}

/// `GET /video/:video_id`
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let id = VideoId::from(video_id);
    let video = with_conn(&ctx, move |conn| videos::get_video(conn, &id)).await?;

    video
        .map(|v| Json(VideoResponse::from(v)))
        .ok_or_else(|| Error::not_found("Video not found").into())
}

/// `GET /videos`
pub async fn list_videos(State(ctx): State<AppContext>) -> Result<Json<Vec<VideoId>>, AppError> {
    let ids = with_conn(&ctx, videos::list_video_ids).await?;
    Ok(Json(ids))
}

/// `GET /videos/search`
pub async fn search_videos(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let video_query = match VideoQuery::build(&query.params()) {
        Ok(q) => q,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected search request");
            return Err(e.into());
        }
    };
    let pagination = query.pagination();

    let page = with_conn(&ctx, move |conn| {
        videos::search_videos(conn, &video_query, pagination)
    })
    .await?
    .map(|video| video.listing());

    Ok(Json(SearchResponse {
        videos: page.items,
        total: page.total,
        pages: page.pages,
        current_page: page.page,
        per_page: page.per_page,
    }))
}
