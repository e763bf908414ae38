use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    normalize_email, BookingLimits, Store, StoreError, StoreResult, DUPLICATE_BOOKING, EVENT_FULL,
};
use crate::models::{Booking, BookingStatus, Event, Identity, Profile, ProfileMetadata, Session};

#[derive(Default)]
struct Tables {
    identities: HashMap<Uuid, Identity>,
    sessions: HashMap<Uuid, Session>,
    profiles: HashMap<Uuid, Profile>,
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

impl Tables {
    fn sorted_events(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.values().collect();
        events.sort_by_key(|e| e.listing_key());
        events
    }

    /// `previous` - статус брони до изменения, `None` для новой брони.
    /// Вместимость проверяется только при переходе в confirmed.
    fn check_booking_limits(
        &self,
        booking: &Booking,
        previous: Option<BookingStatus>,
        limits: BookingLimits,
    ) -> StoreResult<()> {
        if limits.unique_per_user && booking.is_active() {
            let duplicate = self.bookings.values().any(|b| {
                b.id != booking.id
                    && b.event_id == booking.event_id
                    && b.user_id == booking.user_id
                    && b.is_active()
            });
            if duplicate {
                return Err(StoreError::Conflict(DUPLICATE_BOOKING.to_string()));
            }
        }

        let confirming = booking.status == BookingStatus::Confirmed
            && previous != Some(BookingStatus::Confirmed);
        if limits.enforce_capacity && confirming {
            let event = self
                .events
                .get(&booking.event_id)
                .ok_or_else(|| StoreError::not_found("event", booking.event_id))?;
            let confirmed = self
                .bookings
                .values()
                .filter(|b| {
                    b.id != booking.id
                        && b.event_id == booking.event_id
                        && b.status == BookingStatus::Confirmed
                })
                .count();
            if confirmed as i64 >= event.capacity as i64 {
                return Err(StoreError::Conflict(EVENT_FULL.to_string()));
            }
        }
        Ok(())
    }
}

/// Хранилище в памяти с той же семантикой, что и `PgStore`.
/// Все таблицы под одной блокировкой, поэтому каждая операция атомарна.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_identity(
        &self,
        email: &str,
        password_hash: &str,
        metadata: ProfileMetadata,
        is_admin: bool,
    ) -> StoreResult<(Identity, Profile)> {
        let email = normalize_email(email);
        let mut tables = self.tables.write().await;
        if tables.identities.values().any(|i| i.email == email) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email,
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        let mut profile = Profile::from_metadata(identity.id, metadata);
        profile.is_admin = is_admin;
        tables.identities.insert(identity.id, identity.clone());
        tables.profiles.insert(profile.id, profile.clone());
        Ok((identity, profile))
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables.identities.values().find(|i| i.email == email).cloned())
    }

    async fn create_session(
        &self,
        identity_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        if !tables.identities.contains_key(&identity_id) {
            return Err(StoreError::not_found("identity", identity_id));
        }
        let session = Session {
            id: Uuid::new_v4(),
            identity_id,
            created_at: Utc::now(),
            expires_at,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.sessions.remove(&id).is_some())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<Profile> = tables.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| (p.created_at, p.id));
        Ok(profiles)
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .profiles
            .get_mut(&profile.id)
            .ok_or_else(|| StoreError::not_found("profile", profile.id))?;
        // is_admin и created_at через обновление профиля не меняются
        stored.username = profile.username.clone();
        stored.full_name = profile.full_name.clone();
        stored.avatar_url = profile.avatar_url.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_events(&self, limit: i64, offset: i64) -> StoreResult<Vec<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sorted_events()
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_events(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.events.len() as i64)
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> StoreResult<Vec<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sorted_events()
            .into_iter()
            .filter(|e| e.date >= from)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<Event> {
        let mut tables = self.tables.write().await;
        if tables.events.contains_key(&event.id) {
            return Err(StoreError::Conflict(format!("event '{}' already exists", event.id)));
        }
        tables.events.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn update_event(&self, event: &Event) -> StoreResult<Event> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .events
            .get_mut(&event.id)
            .ok_or_else(|| StoreError::not_found("event", event.id))?;
        let created_by = stored.created_by;
        let created_at = stored.created_at;
        *stored = event.clone();
        stored.created_by = created_by;
        stored.created_at = created_at;
        Ok(stored.clone())
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.events.remove(&id).is_some();
        if removed {
            tables.bookings.retain(|_, b| b.event_id != id);
        }
        Ok(removed)
    }

    async fn insert_booking(
        &self,
        booking: &Booking,
        limits: BookingLimits,
    ) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&booking.event_id) {
            return Err(StoreError::not_found("event", booking.event_id));
        }
        if !tables.profiles.contains_key(&booking.user_id) {
            return Err(StoreError::not_found("profile", booking.user_id));
        }
        tables.check_booking_limits(booking, None, limits)?;
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        limits: BookingLimits,
    ) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;
        let previous = tables
            .bookings
            .get(&booking.id)
            .map(|b| b.status)
            .ok_or_else(|| StoreError::not_found("booking", booking.id))?;
        // event и user у брони не меняются, уникальность проверяется только при вставке
        let limits = BookingLimits {
            unique_per_user: false,
            ..limits
        };
        tables.check_booking_limits(booking, Some(previous), limits)?;

        let stored = tables
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| StoreError::not_found("booking", booking.id))?;
        stored.status = booking.status;
        stored.preferences = booking.preferences.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEvent;
    use chrono::NaiveTime;

    fn sample_event(creator: Uuid, day: u32, capacity: i32) -> Event {
        Event::new(
            NewEvent {
                title: format!("Event {day}"),
                description: None,
                date: NaiveDate::from_ymd_opt(2026, 12, day).unwrap(),
                time: NaiveTime::from_hms_opt(18, 0, 0),
                location: None,
                image_url: None,
                price: 10.0,
                capacity,
                category: None,
            },
            creator,
        )
    }

    #[tokio::test]
    async fn identity_gets_exactly_one_profile() {
        let store = MemoryStore::new();
        let (identity, profile) = store
            .create_identity(
                "Ann@Example.com",
                "hash",
                ProfileMetadata {
                    username: Some("ann".to_string()),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();

        assert_eq!(identity.id, profile.id);
        assert_eq!(identity.email, "ann@example.com");
        assert_eq!(profile.username.as_deref(), Some("ann"));
        assert!(!profile.is_admin);
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        store
            .create_identity("a@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let err = store
            .create_identity("A@EXAMPLE.COM ", "h", ProfileMetadata::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_are_listed_by_date() {
        let store = MemoryStore::new();
        let creator = Uuid::new_v4();
        for day in [20, 3, 11] {
            store.insert_event(&sample_event(creator, day, 10)).await.unwrap();
        }

        let page = store.list_events(2, 0).await.unwrap();
        let days: Vec<String> = page.iter().map(|e| e.title.clone()).collect();
        assert_eq!(days, vec!["Event 3", "Event 11"]);

        let rest = store.list_events(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].title, "Event 20");
    }

    #[tokio::test]
    async fn deleting_event_cascades_to_bookings() {
        let store = MemoryStore::new();
        let (_, profile) = store
            .create_identity("b@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let event = store.insert_event(&sample_event(profile.id, 5, 10)).await.unwrap();
        let booking = Booking::pending(event.id, profile.id, None);
        store.insert_booking(&booking, BookingLimits::default()).await.unwrap();

        assert!(store.delete_event(event.id).await.unwrap());
        assert!(store.get_booking(booking.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn limits_reject_duplicates_and_overbooking() {
        let store = MemoryStore::new();
        let (_, user) = store
            .create_identity("c@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let (_, other) = store
            .create_identity("d@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let event = store.insert_event(&sample_event(user.id, 7, 1)).await.unwrap();
        let limits = BookingLimits::enforced(true);

        let first = Booking::pending(event.id, user.id, None);
        store.insert_booking(&first, limits).await.unwrap();
        let dup = Booking::pending(event.id, user.id, None);
        assert!(matches!(
            store.insert_booking(&dup, limits).await,
            Err(StoreError::Conflict(_))
        ));
        // Без ограничений дубликат допустим
        store.insert_booking(&dup, BookingLimits::default()).await.unwrap();

        let mut confirmed = first.clone();
        confirmed.status = BookingStatus::Confirmed;
        store.update_booking(&confirmed, limits).await.unwrap();

        let second = Booking::pending(event.id, other.id, None);
        store.insert_booking(&second, limits).await.unwrap();
        let mut overbooked = second.clone();
        overbooked.status = BookingStatus::Confirmed;
        assert!(matches!(
            store.update_booking(&overbooked, limits).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn confirmed_booking_stays_editable_after_capacity_shrinks() {
        let store = MemoryStore::new();
        let (_, ann) = store
            .create_identity("ann@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let (_, ben) = store
            .create_identity("ben@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let (_, cat) = store
            .create_identity("cat@example.com", "h", ProfileMetadata::default(), false)
            .await
            .unwrap();
        let mut event = store.insert_event(&sample_event(ann.id, 9, 2)).await.unwrap();
        let limits = BookingLimits::enforced(true);

        let mut confirmed = Vec::new();
        for user in [&ann, &ben] {
            let mut booking = Booking::pending(event.id, user.id, None);
            store.insert_booking(&booking, limits).await.unwrap();
            booking.status = BookingStatus::Confirmed;
            confirmed.push(store.update_booking(&booking, limits).await.unwrap());
        }

        event.capacity = 1;
        store.update_event(&event).await.unwrap();

        // Число подтвержденных не меняется, значит правка пожеланий допустима
        let mut edited = confirmed[0].clone();
        edited.preferences = Some("aisle seat".to_string());
        let saved = store.update_booking(&edited, limits).await.unwrap();
        assert_eq!(saved.preferences.as_deref(), Some("aisle seat"));
        assert_eq!(saved.status, BookingStatus::Confirmed);

        // Новое подтверждение по-прежнему упирается во вместимость
        let mut late = Booking::pending(event.id, cat.id, None);
        store.insert_booking(&late, limits).await.unwrap();
        late.status = BookingStatus::Confirmed;
        assert!(matches!(
            store.update_booking(&late, limits).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn admin_flag_is_set_with_the_identity() {
        let store = MemoryStore::new();
        let (identity, profile) = store
            .create_identity("root@example.com", "h", ProfileMetadata::default(), true)
            .await
            .unwrap();
        assert!(profile.is_admin);
        let stored = store.get_profile(identity.id).await.unwrap().unwrap();
        assert!(stored.is_admin);
    }
}
