use crate::{
    error::Result,
    models::admin::AdminStats,
    state::AppState,
    utils::{extract::{Json, Path}, middleware::AdminUser},
};
use axum::{
    extract::State,
    routing::{delete, get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// 全部接口要求管理员身份
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/users", get(list_users))
        .route("/users/:id/block", put(toggle_block))
        .route("/users/:id", delete(delete_user))
        .route("/articles", get(list_articles))
        .route("/articles/:id", delete(delete_article))
        .route("/comments", get(list_comments))
        .route("/comments/:id", delete(delete_comment))
}

/// GET /api/admin/stats
async fn get_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AdminStats>> {
    let stats = state.admin_service.get_stats().await?;
    Ok(Json(stats))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>> {
    let users = state.admin_service.get_users().await?;
    Ok(Json(json!({ "users": users })))
}

/// PUT /api/admin/users/:id/block
async fn toggle_block(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = state.admin_service.toggle_block(&admin, &id).await?;
    let message = if user.is_blocked { "User blocked" } else { "User unblocked" };

    Ok(Json(json!({
        "user": user,
        "message": message,
    })))
}

/// DELETE /api/admin/users/:id
async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.admin_service.delete_user(&admin, &id).await?;
    Ok(Json(json!({ "message": "User and their content deleted" })))
}

/// GET /api/admin/articles
async fn list_articles(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>> {
    let articles = state.article_service.get_all_articles().await?;
    Ok(Json(json!({ "articles": articles })))
}

/// DELETE /api/admin/articles/:id
async fn delete_article(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.article_service.delete_article(&id, &admin).await?;
    info!("Admin {} removed article {}", admin.id, id);
    Ok(Json(json!({ "message": "Article deleted" })))
}

/// GET /api/admin/comments
async fn list_comments(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>> {
    let comments = state.comment_service.get_all_comments().await?;
    Ok(Json(json!({ "comments": comments })))
}

/// DELETE /api/admin/comments/:id
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.comment_service.delete_comment(&id, &admin).await?;
    info!("Admin {} removed comment {}", admin.id, id);
    Ok(Json(json!({ "message": "Comment deleted" })))
}
