use crate::{
    error::Result,
    models::user::*,
    state::AppState,
    utils::{extract::{Json, Path}, middleware::{rate_limit_middleware, AuthUser}},
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// 注册与登录接口按客户端 IP 限流
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/profile/:id", get(get_profile))
}

/// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    debug!("Registering user: {}", request.email);
    let response = state.user_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = state.user_service.login(request).await?;
    Ok(Json(response))
}

/// POST /api/auth/admin/login
async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = state.user_service.admin_login(request).await?;
    Ok(Json(response))
}

/// GET /api/auth/me
async fn me(AuthUser(user): AuthUser) -> Result<Json<Value>> {
    Ok(Json(json!({ "user": user.to_response() })))
}

/// PUT /api/auth/profile
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let user = state.user_service.update_profile(&user.id, request).await?;
    Ok(Json(json!({ "user": user })))
}

/// GET /api/auth/profile/:id
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = state.user_service.get_profile(&id).await?;
    Ok(Json(json!({ "user": user })))
}
