use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiResult;
use crate::extractors::ApiJson;
use crate::middleware::AuthUser;
use crate::models::{Profile, ProfileMetadata};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/session", get(current_session))
}

#[derive(Debug, Deserialize, Validate)]
struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    pub full_name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// POST /api/auth/sign-up
async fn sign_up(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let metadata = ProfileMetadata {
        username: req.username,
        full_name: req.full_name,
        avatar_url: req.avatar_url,
    };
    let session = state
        .auth
        .sign_up(state.store.as_ref(), &req.email, &req.password, metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

// POST /api/auth/sign-in
async fn sign_in(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let session = state
        .auth
        .sign_in(state.store.as_ref(), &req.email, &req.password)
        .await?;
    Ok(Json(session))
}

// POST /api/auth/sign-out
async fn sign_out(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    state
        .auth
        .sign_out(state.store.as_ref(), user.session_id)
        .await?;
    tracing::info!("Identity {} signed out", user.profile.id);
    Ok(Json(json!({ "success": true })))
}

// GET /api/auth/session
async fn current_session(user: AuthUser) -> Json<Profile> {
    Json(user.profile)
}
