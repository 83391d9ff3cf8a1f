use crate::{
    error::Result,
    models::comment::*,
    state::AppState,
    utils::{extract::{Json, Path}, middleware::AuthUser},
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_comment))
        .route("/article/:article_id", get(get_article_comments))
        .route("/:id", put(update_comment).delete(delete_comment))
}

/// GET /api/comments/article/:article_id
async fn get_article_comments(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("Fetching comments for article: {}", article_id);
    let comments = state.comment_service.get_article_comments(&article_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// POST /api/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let comment = state.comment_service.create_comment(&user, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))))
}

/// PUT /api/comments/:id
async fn update_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>> {
    let comment = state.comment_service.update_comment(&id, &user, request).await?;
    Ok(Json(json!({ "comment": comment })))
}

/// DELETE /api/comments/:id
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.comment_service.delete_comment(&id, &user).await?;
    Ok(Json(json!({ "message": "Comment deleted" })))
}
