use crate::{
    error::Result,
    models::bookmark::*,
    state::AppState,
    utils::{extract::{Json, Path}, middleware::AuthUser},
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_user_bookmarks))
        .route("/toggle", post(toggle_bookmark))
        .route("/check/:article_id", get(check_bookmark))
}

/// Get user's bookmarks
/// GET /api/bookmarks
async fn get_user_bookmarks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    debug!("Getting bookmarks for user: {}", user.id);
    let bookmarks = state.bookmark_service.get_bookmarks(&user).await?;
    Ok(Json(json!({ "bookmarks": bookmarks })))
}

/// Toggle a bookmark
/// POST /api/bookmarks/toggle
async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ToggleBookmarkRequest>,
) -> Result<Json<BookmarkStatus>> {
    request.validate()?;

    let is_bookmarked = state
        .bookmark_service
        .toggle_bookmark(&user, &request.article_id)
        .await?;
    Ok(Json(BookmarkStatus { is_bookmarked }))
}

/// Check if article is bookmarked
/// GET /api/bookmarks/check/:article_id
async fn check_bookmark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(article_id): Path<String>,
) -> Result<Json<BookmarkStatus>> {
    let is_bookmarked = state.bookmark_service.is_bookmarked(&user, &article_id).await?;
    Ok(Json(BookmarkStatus { is_bookmarked }))
}
