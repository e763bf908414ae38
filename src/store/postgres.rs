use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{
    normalize_email, BookingLimits, Store, StoreError, StoreResult, DUPLICATE_BOOKING, EVENT_FULL,
};
use crate::models::{Booking, BookingStatus, Event, Identity, Profile, ProfileMetadata, Session};

const EVENT_COLUMNS: &str = "id, title, description, date, time, location, image_url, \
                             price, capacity, category, created_by, created_at";
const PROFILE_COLUMNS: &str = "id, username, full_name, avatar_url, is_admin, created_at, updated_at";
const BOOKING_COLUMNS: &str = "id, event_id, user_id, status, preferences, created_at, updated_at";

/// Уникальные нарушения превращаются в `Conflict`, остальное остается ошибкой БД
fn map_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    /// Блокирует строку события до конца транзакции, чтобы проверки
    /// уникальности и вместимости не гонялись с параллельными бронями
    async fn lock_event(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> StoreResult<i32> {
        sqlx::query_scalar::<_, i32>("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::not_found("event", event_id))
    }

    /// `previous` - статус брони до изменения, `None` для новой брони
    async fn check_limits(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        previous: Option<BookingStatus>,
        limits: BookingLimits,
        capacity: i32,
    ) -> StoreResult<()> {
        if limits.unique_per_user && booking.is_active() {
            let duplicate = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                    SELECT 1 FROM bookings
                    WHERE event_id = $1 AND user_id = $2 AND id <> $3 AND status <> 'cancelled'
                 )",
            )
            .bind(booking.event_id)
            .bind(booking.user_id)
            .bind(booking.id)
            .fetch_one(&mut **tx)
            .await?;
            if duplicate {
                return Err(StoreError::Conflict(DUPLICATE_BOOKING.to_string()));
            }
        }

        // Уже подтвержденная бронь место не занимает повторно
        let confirming = booking.status == BookingStatus::Confirmed
            && previous != Some(BookingStatus::Confirmed);
        if limits.enforce_capacity && confirming {
            let confirmed = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM bookings
                 WHERE event_id = $1 AND id <> $2 AND status = 'confirmed'",
            )
            .bind(booking.event_id)
            .bind(booking.id)
            .fetch_one(&mut **tx)
            .await?;
            if confirmed >= capacity as i64 {
                return Err(StoreError::Conflict(EVENT_FULL.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_identity(
        &self,
        email: &str,
        password_hash: &str,
        metadata: ProfileMetadata,
        is_admin: bool,
    ) -> StoreResult<(Identity, Profile)> {
        let meta = serde_json::to_value(&metadata).unwrap_or_default();
        let mut tx = self.pool.begin().await?;

        // Профиль создает триггер handle_new_identity в той же транзакции
        let identity = sqlx::query_as::<_, Identity>(
            "INSERT INTO identities (id, email, password_hash, raw_user_meta_data)
             VALUES ($1, $2, $3, $4)
             RETURNING id, email, password_hash, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(normalize_email(email))
        .bind(password_hash)
        .bind(meta)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "email already registered"))?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET is_admin = is_admin OR $2 WHERE id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(identity.id)
        .bind(is_admin)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((identity, profile))
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        Ok(sqlx::query_as::<_, Identity>(
            "SELECT id, email, password_hash, created_at FROM identities WHERE LOWER(email) = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_session(
        &self,
        identity_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        Ok(sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, identity_id, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, identity_id, created_at, expires_at",
        )
        .bind(Uuid::new_v4())
        .bind(identity_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT id, identity_id, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        Ok(sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET username = $2, full_name = $3, avatar_url = $4
             WHERE id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("profile", profile.id))
    }

    async fn list_events(&self, limit: i64, offset: i64) -> StoreResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             ORDER BY date, time NULLS FIRST, id
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StoreResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE date >= $1
             ORDER BY date, time NULLS FIRST, id
             LIMIT $2"
        ))
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, title, description, date, time, location, image_url,
                                 price, capacity, category, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.time)
        .bind(&event.location)
        .bind(&event.image_url)
        .bind(event.price)
        .bind(event.capacity)
        .bind(&event.category)
        .bind(event.created_by)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "event already exists"))
    }

    async fn update_event(&self, event: &Event) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET title = $2, description = $3, date = $4, time = $5,
                    location = $6, image_url = $7, price = $8, capacity = $9, category = $10
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.time)
        .bind(&event.location)
        .bind(&event.image_url)
        .bind(event.price)
        .bind(event.capacity)
        .bind(&event.category)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("event", event.id))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_booking(
        &self,
        booking: &Booking,
        limits: BookingLimits,
    ) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let capacity = Self::lock_event(&mut tx, booking.event_id).await?;
        Self::check_limits(&mut tx, booking, None, limits, capacity).await?;

        let created = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (id, event_id, user_id, status, preferences, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.user_id)
        .bind(booking.status)
        .bind(&booking.preferences)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "booking already exists"))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        limits: BookingLimits,
    ) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let capacity = Self::lock_event(&mut tx, booking.event_id).await?;
        let previous = sqlx::query_scalar::<_, BookingStatus>(
            "SELECT status FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(booking.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("booking", booking.id))?;
        let limits = BookingLimits {
            unique_per_user: false,
            ..limits
        };
        Self::check_limits(&mut tx, booking, Some(previous), limits, capacity).await?;

        let updated = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $2, preferences = $3
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(booking.status)
        .bind(&booking.preferences)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("booking", booking.id))?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE user_id = $1
             ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
