use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::{Profile, ProfilePatch};
use crate::policy;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/{id}", get(get_profile).patch(update_profile))
}

fn ensure_visible(viewer: &MaybeAuthUser) -> ApiResult<()> {
    if policy::can_read_profiles(viewer.actor().as_ref()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("profiles are not visible".to_string()))
    }
}

// GET /api/profiles
async fn list_profiles(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
) -> ApiResult<Json<Vec<Profile>>> {
    ensure_visible(&viewer)?;
    Ok(Json(state.store.list_profiles().await?))
}

// GET /api/profiles/{id}
async fn get_profile(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Profile>> {
    ensure_visible(&viewer)?;
    let profile = state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile", id))?;
    Ok(Json(profile))
}

// PATCH /api/profiles/{id}
async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> ApiResult<Json<Profile>> {
    let mut profile = state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile", id))?;
    policy::authorize_profile_update(Some(&user.actor()), &profile, &patch)?;

    profile.apply(&patch);
    Ok(Json(state.store.update_profile(&profile).await?))
}
