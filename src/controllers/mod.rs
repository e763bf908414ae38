pub mod auth;
pub mod events;
pub mod bookings;
pub mod profiles;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(events::routes())
        .merge(bookings::routes())
        .merge(profiles::routes())
}
