use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub price: f64,
    pub capacity: i32,
    pub category: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub price: f64,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub capacity: i32,
    pub category: Option<String>,
}

/// Необязательные поля события можно очистить, передав `null`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventPatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub location: Option<Option<String>>,
    #[validate(url)]
    #[serde(default, deserialize_with = "super::nullable")]
    pub image_url: Option<Option<String>>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    pub capacity: Option<i32>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub category: Option<Option<String>>,
}

impl Event {
    pub fn new(input: NewEvent, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            date: input.date,
            time: input.time,
            location: input.location,
            image_url: input.image_url,
            price: input.price,
            capacity: input.capacity,
            category: input.category,
            created_by: Some(created_by),
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, patch: &EventPatch) {
        if let Some(v) = &patch.title {
            self.title = v.clone();
        }
        if let Some(v) = &patch.description {
            self.description = v.clone();
        }
        if let Some(v) = patch.date {
            self.date = v;
        }
        if let Some(v) = patch.time {
            self.time = v;
        }
        if let Some(v) = &patch.location {
            self.location = v.clone();
        }
        if let Some(v) = &patch.image_url {
            self.image_url = v.clone();
        }
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.capacity {
            self.capacity = v;
        }
        if let Some(v) = &patch.category {
            self.category = v.clone();
        }
    }

    /// Ключ сортировки списка: дата, затем время (без времени - раньше), затем id
    pub fn listing_key(&self) -> (NaiveDate, Option<NaiveTime>, Uuid) {
        (self.date, self.time, self.id)
    }

    /// Регистронезависимый поиск подстроки; `needle` уже в нижнем регистре
    pub fn matches(&self, needle: &str) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(needle);
        hit(&self.title)
            || [&self.description, &self.location, &self.category]
                .into_iter()
                .flatten()
                .any(|f| hit(f.as_str()))
    }
}
