//! policy.rs
//!
//! Построчные правила доступа к данным. Каждая мутация в контроллерах
//! проходит через одну из функций `authorize_*` до обращения к хранилищу.
//!
//! - События и профили читает кто угодно, включая анонимов.
//! - Писать события может только администратор.
//! - Бронирование читает и изменяет только его владелец (user_id == actor.id),
//!   у администратора здесь нет дополнительных прав.
//! - Профиль изменяет только владелец, флаг администратора через API не меняется.

use uuid::Uuid;

use crate::models::{Booking, Profile, ProfilePatch};

/// Действующая личность, от имени которой выполняется запрос.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            is_admin: profile.is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
}

pub type PolicyResult = Result<(), PolicyViolation>;

fn signed_in(actor: Option<&Actor>) -> Result<&Actor, PolicyViolation> {
    actor.ok_or(PolicyViolation::Unauthenticated)
}

pub fn can_read_events(_actor: Option<&Actor>) -> bool {
    true
}

pub fn can_read_profiles(_actor: Option<&Actor>) -> bool {
    true
}

/// Создание, изменение и удаление событий.
pub fn authorize_event_write(actor: Option<&Actor>) -> PolicyResult {
    let actor = signed_in(actor)?;
    if actor.is_admin {
        Ok(())
    } else {
        Err(PolicyViolation::Forbidden("only administrators can modify events"))
    }
}

pub fn authorize_booking_insert(actor: Option<&Actor>, user_id: Uuid) -> PolicyResult {
    let actor = signed_in(actor)?;
    if actor.id == user_id {
        Ok(())
    } else {
        Err(PolicyViolation::Forbidden("bookings can only be made for yourself"))
    }
}

pub fn authorize_booking_update(actor: Option<&Actor>, booking: &Booking) -> PolicyResult {
    let actor = signed_in(actor)?;
    if actor.id == booking.user_id {
        Ok(())
    } else {
        Err(PolicyViolation::Forbidden("booking belongs to another user"))
    }
}

pub fn authorize_booking_read(actor: Option<&Actor>, booking: &Booking) -> PolicyResult {
    authorize_booking_update(actor, booking)
}

pub fn authorize_profile_update(
    actor: Option<&Actor>,
    profile: &Profile,
    patch: &ProfilePatch,
) -> PolicyResult {
    let actor = signed_in(actor)?;
    if actor.id != profile.id {
        return Err(PolicyViolation::Forbidden("profile belongs to another user"));
    }
    match patch.is_admin {
        Some(flag) if flag != profile.is_admin => {
            Err(PolicyViolation::Forbidden("admin flag cannot be changed"))
        }
        _ => Ok(()),
    }
}
