use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Статус бронирования (`booking_status` в Postgres).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Допустимы только pending -> confirmed и pending -> cancelled.
    /// Повторная установка того же статуса не считается переходом.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        ) || self == next
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: BookingStatus,
    pub preferences: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Тело запроса на бронирование; user_id берется из сессии
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBooking {
    pub event_id: Uuid,
    #[validate(length(max = 2000))]
    pub preferences: Option<String>,
}

/// `preferences: null` очищает пожелания, отсутствие поля оставляет их как есть
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    #[validate(length(max = 2000))]
    #[serde(default, deserialize_with = "super::nullable")]
    pub preferences: Option<Option<String>>,
}

impl Booking {
    /// Новая бронь всегда создается в статусе pending
    pub fn pending(event_id: Uuid, user_id: Uuid, preferences: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            status: BookingStatus::Pending,
            preferences,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}
