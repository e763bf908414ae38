use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Profile;
use crate::policy::Actor;
use crate::AppState;

/// Пользователь с активной сессией
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile: Profile,
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::from_profile(&self.profile)
    }
}

/// Для публичных маршрутов: аноним допустим, битый токен - нет
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn actor(&self) -> Option<Actor> {
        self.0.as_ref().map(AuthUser::actor)
    }
}

fn bearer_token(parts: &Parts) -> Option<Result<&str, ApiError>> {
    let value = parts.headers.get(header::AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthenticated);
    Some(token)
}

async fn resolve(token: &str, state: &AppState) -> Result<AuthUser, ApiError> {
    let (profile, session_id) = state
        .auth
        .authenticate(state.store.as_ref(), token)
        .await?;
    Ok(AuthUser {
        profile,
        session_id,
    })
}

// Bearer JWT extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)??;
        resolve(token, state).await
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => Ok(MaybeAuthUser(Some(resolve(token?, state).await?))),
        }
    }
}
