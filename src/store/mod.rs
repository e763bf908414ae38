//! Слой доступа к данным.
//!
//! `Store` описывает все операции над таблицами identities, sessions,
//! profiles, events и bookings. Проверки доступа сюда не входят, они
//! выполняются в `crate::policy` до вызова хранилища.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{Booking, Event, Identity, Profile, ProfileMetadata, Session};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ограничения, применяемые при записи брони (см. `FeatureFlags::enforce_booking_limits`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingLimits {
    /// Не больше одной неотмененной брони на пару (event, user)
    pub unique_per_user: bool,
    /// Число подтвержденных броней не превышает capacity события
    pub enforce_capacity: bool,
}

impl BookingLimits {
    pub fn enforced(on: bool) -> Self {
        Self {
            unique_per_user: on,
            enforce_capacity: on,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- identities & sessions ---

    /// Создает identity и ровно один связанный профиль одной операцией,
    /// вместе с флагом администратора.
    /// Email сравнивается без учета регистра; дубликат дает `Conflict`.
    async fn create_identity(
        &self,
        email: &str,
        password_hash: &str,
        metadata: ProfileMetadata,
        is_admin: bool,
    ) -> StoreResult<(Identity, Profile)>;

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    async fn create_session(
        &self,
        identity_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session>;

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>>;

    /// Возвращает true, если сессия существовала
    async fn delete_session(&self, id: Uuid) -> StoreResult<bool>;

    // --- profiles ---

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;

    async fn update_profile(&self, profile: &Profile) -> StoreResult<Profile>;

    // --- events ---

    /// Страница событий по дате, времени и id по возрастанию
    async fn list_events(&self, limit: i64, offset: i64) -> StoreResult<Vec<Event>>;

    async fn count_events(&self) -> StoreResult<i64>;

    /// Ближайшие события начиная с `from` (для карусели)
    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StoreResult<Vec<Event>>;

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn insert_event(&self, event: &Event) -> StoreResult<Event>;

    async fn update_event(&self, event: &Event) -> StoreResult<Event>;

    /// Удаление каскадно удаляет брони события
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    // --- bookings ---

    /// Событие должно существовать, иначе `NotFound`
    async fn insert_booking(&self, booking: &Booking, limits: BookingLimits)
        -> StoreResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn update_booking(&self, booking: &Booking, limits: BookingLimits)
        -> StoreResult<Booking>;

    /// Брони пользователя, новые первыми
    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) const DUPLICATE_BOOKING: &str = "an active booking for this event already exists";
pub(crate) const EVENT_FULL: &str = "event is fully booked";
