pub mod profile;
pub mod event;
pub mod booking;
pub mod identity;

pub use profile::{Profile, ProfileMetadata, ProfilePatch};
pub use event::{Event, EventPatch, NewEvent};
pub use booking::{Booking, BookingPatch, BookingStatus, NewBooking};
pub use identity::{Identity, Session};

use serde::{Deserialize, Deserializer};

/// Для PATCH-полей вида `Option<Option<T>>`: отсутствующее поле - `None`
/// (не трогать), `null` - `Some(None)` (очистить), значение - `Some(Some(v))`.
/// Используется вместе с `#[serde(default)]`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
