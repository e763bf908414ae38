use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::models::{Booking, BookingPatch, NewBooking};
use crate::policy;
use crate::store::BookingLimits;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking).patch(update_booking))
}

fn limits(state: &AppState) -> BookingLimits {
    BookingLimits::enforced(state.config.features.enforce_booking_limits)
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
// Без ENFORCE_BOOKING_LIMITS вместимость и повторные брони не проверяются
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<NewBooking>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let booking = Booking::pending(req.event_id, user.profile.id, req.preferences);
    policy::authorize_booking_insert(Some(&user.actor()), booking.user_id)?;

    let booking = state
        .store
        .insert_booking(&booking, limits(&state))
        .await
        .map_err(|e| {
            tracing::warn!("create_booking for event {} failed: {}", req.event_id, e);
            ApiError::from(e)
        })?;

    tracing::info!(
        "Booking {} created for event {} by {}",
        booking.id,
        booking.event_id,
        booking.user_id
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Booking>>> {
    let bookings = state.store.list_bookings_for_user(user.profile.id).await?;
    Ok(Json(bookings))
}

async fn load_booking(state: &AppState, id: Uuid) -> ApiResult<Booking> {
    state
        .store
        .get_booking(id)
        .await?
        .ok_or_else(|| ApiError::not_found("booking", id))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Booking>> {
    let booking = load_booking(&state, id).await?;
    policy::authorize_booking_read(Some(&user.actor()), &booking)?;
    Ok(Json(booking))
}

// PATCH /api/bookings/{id} - смена статуса и/или пожеланий, только владелец
async fn update_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<BookingPatch>,
) -> ApiResult<Json<Booking>> {
    patch.validate()?;

    let mut booking = load_booking(&state, id).await?;
    policy::authorize_booking_update(Some(&user.actor()), &booking)?;

    if let Some(next) = patch.status {
        if !booking.status.can_transition_to(next) {
            return Err(ApiError::Conflict(format!(
                "cannot change booking status from {} to {}",
                booking.status, next
            )));
        }
        booking.status = next;
    }
    if let Some(preferences) = patch.preferences {
        booking.preferences = preferences;
    }

    let booking = state.store.update_booking(&booking, limits(&state)).await?;
    tracing::info!("Booking {} is now {}", booking.id, booking.status);
    Ok(Json(booking))
}
