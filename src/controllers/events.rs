use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::cache::events::{featured_key, page_key};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::{Event, EventPatch, NewEvent};
use crate::policy;
use crate::services::listing::{self, PageCount};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/count", get(count_events))
        .route("/events/featured", get(featured_events))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
}

fn ensure_visible(viewer: &MaybeAuthUser) -> ApiResult<()> {
    if policy::can_read_events(viewer.actor().as_ref()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("events are not visible".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub page: Option<u32>,
    /// Поиск по подстроке в пределах загруженной страницы
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventsPage {
    pub success: bool,
    pub page: u32,
    pub page_size: u32,
    pub events: Vec<Event>,
    pub count: usize,
}

// GET /api/events?page=N&q=...
async fn list_events(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiQuery(params): ApiQuery<EventsQuery>,
) -> ApiResult<Json<EventsPage>> {
    ensure_visible(&viewer)?;

    let page = params.page.unwrap_or(1).max(1);
    let page_size = state.config.listing.page_size;
    let key = page_key(page, page_size);

    let events = match state.cache.get_events(&key).await {
        Some(events) => events,
        None => {
            let (limit, offset) = listing::page_bounds(page, page_size);
            let events = state.store.list_events(limit, offset).await?;
            state.cache.put_events(&key, &events).await;
            events
        }
    };

    let events = listing::filter_page(events, params.q.as_deref());
    Ok(Json(EventsPage {
        success: true,
        page,
        page_size,
        count: events.len(),
        events,
    }))
}

// GET /api/events/count
async fn count_events(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
) -> ApiResult<Json<PageCount>> {
    ensure_visible(&viewer)?;
    let count = match state.cache.get_event_count().await {
        Some(count) => count,
        None => {
            let count = state.store.count_events().await?;
            state.cache.put_event_count(count).await;
            count
        }
    };
    Ok(Json(listing::page_count(count, state.config.listing.page_size)))
}

// GET /api/events/featured - ближайшие события для карусели
async fn featured_events(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
) -> ApiResult<Json<Vec<Event>>> {
    ensure_visible(&viewer)?;
    let limit = state.config.listing.featured_limit;
    let key = featured_key(limit);
    if let Some(events) = state.cache.get_events(&key).await {
        return Ok(Json(events));
    }

    let today = Utc::now().date_naive();
    let events = state.store.upcoming_events(today, limit as i64).await?;
    state.cache.put_events(&key, &events).await;
    Ok(Json(events))
}

// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Event>> {
    ensure_visible(&viewer)?;
    let event = state
        .store
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::not_found("event", id))?;
    Ok(Json(event))
}

// POST /api/events (admin)
async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<NewEvent>,
) -> ApiResult<impl IntoResponse> {
    policy::authorize_event_write(Some(&user.actor()))?;
    req.validate()?;

    let event = state.store.insert_event(&Event::new(req, user.profile.id)).await?;
    state.cache.invalidate_events().await;
    tracing::info!("Event {} created by {}", event.id, user.profile.id);
    Ok((StatusCode::CREATED, Json(event)))
}

// PATCH /api/events/{id} (admin)
async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> ApiResult<Json<Event>> {
    policy::authorize_event_write(Some(&user.actor()))?;
    patch.validate()?;

    let mut event = state
        .store
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::not_found("event", id))?;
    event.apply(&patch);

    let event = state.store.update_event(&event).await?;
    state.cache.invalidate_events().await;
    Ok(Json(event))
}

// DELETE /api/events/{id} (admin), брони удаляются каскадно
async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::authorize_event_write(Some(&user.actor()))?;

    if !state.store.delete_event(id).await? {
        return Err(ApiError::not_found("event", id));
    }
    state.cache.invalidate_events().await;
    tracing::info!("Event {} deleted by {}", id, user.profile.id);
    Ok(StatusCode::NO_CONTENT)
}
