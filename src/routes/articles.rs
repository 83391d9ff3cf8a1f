use crate::{
    error::Result,
    models::article::*,
    state::AppState,
    utils::{extract::{Json, Path, Query}, middleware::{AuthUser, OptionalUser}},
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct UserArticlesQuery {
    pub keyword: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // 公开路由
        .route("/", get(list_articles).post(create_article))
        .route("/search", get(search_articles))
        .route("/keywords", get(top_keywords))
        .route("/slug/:slug", get(get_article_by_slug))
        .route("/user/:user_id", get(get_user_articles))
        // 需要认证的路由
        .route("/my/drafts", get(my_drafts))
        .route("/my/articles", get(my_articles))
        .route("/:id", get(get_article).put(update_article).delete(delete_article))
        .route("/:id/like", post(toggle_like))
}

/// GET /api/articles
async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<ArticleListResponse>> {
    debug!("Fetching articles list with query: {:?}", query);

    let result = state.article_service.get_articles(query).await?;

    Ok(Json(ArticleListResponse {
        articles: result.data,
        total_pages: result.total_pages,
        current_page: result.page,
        total: result.total,
    }))
}

/// GET /api/articles/search?q=
async fn search_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let articles = state.article_service.search_articles(query.q.as_deref()).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /api/articles/keywords
async fn top_keywords(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let keywords = state.keyword_service.get_top_keywords().await?;
    Ok(Json(json!(keywords)))
}

/// GET /api/articles/slug/:slug
async fn get_article_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    OptionalUser(viewer): OptionalUser,
) -> Result<Json<Value>> {
    let (article, is_liked) = state
        .article_service
        .get_article_view(&slug, viewer.as_ref())
        .await?;

    Ok(Json(json!({
        "article": article,
        "isLiked": is_liked,
    })))
}

/// GET /api/articles/user/:user_id
async fn get_user_articles(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<UserArticlesQuery>,
) -> Result<Json<Value>> {
    let (articles, keyword_stats) = state
        .article_service
        .get_user_articles(&user_id, query.keyword.as_deref())
        .await?;

    Ok(Json(json!({
        "articles": articles,
        "keywordStats": keyword_stats,
    })))
}

/// POST /api/articles
async fn create_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let article = state.article_service.create_article(&user, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "article": article }))))
}

/// GET /api/articles/my/drafts
async fn my_drafts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    let articles = state.article_service.get_my_drafts(&user).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /api/articles/my/articles
async fn my_articles(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    let articles = state.article_service.get_my_articles(&user).await?;
    Ok(Json(json!({ "articles": articles })))
}

/// GET /api/articles/:id
async fn get_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let article = state.article_service.get_article_for_edit(&id, &user).await?;
    Ok(Json(json!({ "article": article })))
}

/// PUT /api/articles/:id
async fn update_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateArticleRequest>,
) -> Result<Json<Value>> {
    let article = state.article_service.update_article(&id, &user, request).await?;
    Ok(Json(json!({ "article": article })))
}

/// DELETE /api/articles/:id
async fn delete_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.article_service.delete_article(&id, &user).await?;
    Ok(Json(json!({ "message": "Article deleted" })))
}

/// POST /api/articles/:id/like
async fn toggle_like(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>> {
    let response = state.article_service.toggle_like(&id, &user).await?;
    Ok(Json(response))
}
